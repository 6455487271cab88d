//! Work queues returned by `WorkflowService::queue_for`.

use std::sync::Arc;

use access_workflow::models::actor::{Actor, Role};
use access_workflow::models::stage::StageName;
use access_workflow::persistence::db;
use access_workflow::workflow::{StageAction, WorkflowService};

use super::test_helpers::{
    approve_through, resolver, sample_request, service, submit_sample, ADMIN, DIVISIONAL,
    HEAD_OF_IT, HOD, ICT_DIRECTOR, OTHER_STAFF, STAFF, STAFF_PF,
};

#[tokio::test]
async fn request_moves_between_approver_queues() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;

    let hod_queue = service.queue_for(HOD).await.expect("queue");
    assert_eq!(hod_queue.len(), 1);
    assert_eq!(hod_queue[0].request.id, id);
    assert!(service.queue_for(DIVISIONAL).await.expect("queue").is_empty());

    approve_through(&service, &id, StageName::Hod).await;

    assert!(service.queue_for(HOD).await.expect("queue").is_empty());
    let div_queue = service.queue_for(DIVISIONAL).await.expect("queue");
    assert_eq!(div_queue.len(), 1);
    assert_eq!(div_queue[0].request.id, id);
}

#[tokio::test]
async fn rejected_requests_leave_approver_queues() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;
    approve_through(&service, &id, StageName::DivisionalDirector).await;
    service
        .decide(
            ICT_DIRECTOR,
            &id,
            StageAction::reject(StageName::IctDirector, "incomplete form"),
        )
        .await
        .expect("reject");

    assert!(service.queue_for(ICT_DIRECTOR).await.expect("queue").is_empty());
    assert!(service.queue_for(HEAD_OF_IT).await.expect("queue").is_empty());

    let mine = service.queue_for(STAFF).await.expect("queue");
    assert_eq!(mine.len(), 1, "requester still sees the rejected request");
}

#[tokio::test]
async fn staff_see_only_their_own_requests() {
    let (service, _db) = service().await;
    submit_sample(&service).await;

    assert_eq!(service.queue_for(STAFF).await.expect("queue").len(), 1);
    assert!(service.queue_for(OTHER_STAFF).await.expect("queue").is_empty());
}

#[tokio::test]
async fn admin_sees_every_open_request() {
    let (service, _db) = service().await;
    let keep = submit_sample(&service).await;
    let drop = submit_sample(&service).await;
    service.cancel(ADMIN, &drop, None).await.expect("cancel");

    let all = service.queue_for(ADMIN).await.expect("queue");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].request.id, keep);
}

#[tokio::test]
async fn staff_queue_matches_pf_number_in_any_case() {
    let db = Arc::new(db::connect_memory().await.expect("db"));
    let identity = resolver().with_actor(
        "tok-lowercase-staff",
        Actor::new(Role::Staff, "Asha Juma").with_pf_number(STAFF_PF.to_lowercase()),
    );
    let service = WorkflowService::new(db, Arc::new(identity));

    let submitted = service
        .submit("tok-lowercase-staff", sample_request())
        .await
        .expect("submit for own pf number");
    assert_eq!(submitted.pf_number, STAFF_PF);

    let mine = service.queue_for("tok-lowercase-staff").await.expect("queue");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].request.id, submitted.id);
}
