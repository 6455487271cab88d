//! End-to-end approval flow through `WorkflowService`.
//!
//! Covers the happy path through all five stages, stage gating, role
//! checks, rejection and resubmission, cancellation, and the audit trail.

use std::sync::Arc;

use chrono::Utc;

use access_workflow::audit::{AuditLogger, JsonlAuditWriter};
use access_workflow::models::request::CurrentStage;
use access_workflow::models::stage::{StageName, StageStatus};
use access_workflow::workflow::{StageAction, WorkflowService};
use access_workflow::AppError;

use super::test_helpers::{
    approve_through, resolver, sample_request, service, submit_sample, token_for, ADMIN,
    DIVISIONAL, HEAD_OF_IT, HOD, ICT_DIRECTOR, OFFICER_A, OTHER_STAFF, STAFF,
};

#[tokio::test]
async fn submitted_request_awaits_hod() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;

    let status = service.status(&id).await.expect("status");
    assert_eq!(status.current, CurrentStage::Awaiting(StageName::Hod));
    assert!(status.assignments.is_empty());
    assert!(status
        .request
        .stages
        .iter()
        .all(|record| record.status() == StageStatus::Pending));
}

#[tokio::test]
async fn full_approval_completes_request() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;

    let request = approve_through(&service, &id, StageName::IctOfficer).await;

    let status = service.status(&id).await.expect("status");
    assert_eq!(status.current, CurrentStage::Completed);
    assert_eq!(request.version, 5);
    for stage in StageName::SEQUENCE {
        let record = status.request.stage(stage).expect("record");
        assert_eq!(record.status(), StageStatus::Approved, "{stage} approved");
        assert!(record.signoff().is_some());
    }
    let hod = status.request.stage(StageName::Hod).expect("hod");
    assert_eq!(
        hod.signoff().and_then(|s| s.signature_ref.as_deref()),
        Some("sig/hod.png")
    );
}

#[tokio::test]
async fn each_approval_advances_exactly_one_stage() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;

    for (index, stage) in StageName::SEQUENCE.iter().copied().enumerate() {
        let expected_before = CurrentStage::Awaiting(stage);
        assert_eq!(service.status(&id).await.expect("status").current, expected_before);

        service
            .decide(token_for(stage), &id, StageAction::approve(stage))
            .await
            .expect("approve");

        let after = service.status(&id).await.expect("status").current;
        match StageName::SEQUENCE.get(index + 1) {
            Some(next) => assert_eq!(after, CurrentStage::Awaiting(*next)),
            None => assert_eq!(after, CurrentStage::Completed),
        }
    }
}

#[tokio::test]
async fn out_of_order_decision_is_gate_violation_and_changes_nothing() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;

    let err = service
        .decide(ICT_DIRECTOR, &id, StageAction::approve(StageName::IctDirector))
        .await
        .expect_err("hod still pending");
    assert!(matches!(err, AppError::StageGateViolation(_)), "unexpected: {err}");

    let status = service.status(&id).await.expect("status");
    assert_eq!(status.current, CurrentStage::Awaiting(StageName::Hod));
    assert_eq!(status.request.version, 0);
}

#[tokio::test]
async fn wrong_role_is_unauthorized() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;

    let err = service
        .decide(DIVISIONAL, &id, StageAction::approve(StageName::Hod))
        .await
        .expect_err("divisional cannot decide hod");
    assert!(matches!(err, AppError::UnauthorizedActor(_)), "unexpected: {err}");

    let err = service
        .decide(STAFF, &id, StageAction::approve(StageName::Hod))
        .await
        .expect_err("staff cannot approve");
    assert!(matches!(err, AppError::UnauthorizedActor(_)));
}

#[tokio::test]
async fn unknown_token_is_unauthorized() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;

    let err = service
        .decide("forged", &id, StageAction::approve(StageName::Hod))
        .await
        .expect_err("unknown token");
    assert!(matches!(err, AppError::UnauthorizedActor(_)));
}

#[tokio::test]
async fn rejection_requires_reason() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;

    let err = service
        .decide(HOD, &id, StageAction::reject(StageName::Hod, "  "))
        .await
        .expect_err("blank reason");
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(
        service.status(&id).await.expect("status").current,
        CurrentStage::Awaiting(StageName::Hod)
    );
}

#[tokio::test]
async fn rejection_halts_and_resubmission_reopens_stage() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;
    approve_through(&service, &id, StageName::DivisionalDirector).await;

    service
        .decide(
            ICT_DIRECTOR,
            &id,
            StageAction::reject(StageName::IctDirector, "justify internet access"),
        )
        .await
        .expect("reject");

    let status = service.status(&id).await.expect("status");
    assert_eq!(status.current, CurrentStage::Rejected(StageName::IctDirector));
    assert_eq!(
        status.request.stage(StageName::Hod).expect("hod").status(),
        StageStatus::Approved
    );

    let err = service
        .decide(HEAD_OF_IT, &id, StageAction::approve(StageName::HeadOfIt))
        .await
        .expect_err("halted");
    assert!(matches!(err, AppError::StageGateViolation(_)));

    let request = service
        .resubmit(STAFF, &id, StageName::IctDirector)
        .await
        .expect("resubmit");
    assert_eq!(request.resubmission_count, 1);
    assert!(request.last_resubmitted_at.is_some());
    assert_eq!(request.last_resubmitted_by.as_deref(), Some("Asha Juma"));

    let status = service.status(&id).await.expect("status");
    assert_eq!(status.current, CurrentStage::Awaiting(StageName::IctDirector));
    assert_eq!(
        status.request.stage(StageName::DivisionalDirector).expect("div").status(),
        StageStatus::Approved
    );

    service
        .decide(ICT_DIRECTOR, &id, StageAction::approve(StageName::IctDirector))
        .await
        .expect("approve after resubmission");
}

#[tokio::test]
async fn resubmitting_a_pending_stage_is_invalid() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;

    let err = service
        .resubmit(STAFF, &id, StageName::Hod)
        .await
        .expect_err("nothing rejected");
    assert!(matches!(err, AppError::InvalidResubmission(_)), "unexpected: {err}");
}

#[tokio::test]
async fn only_requester_or_admin_may_resubmit() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;
    service
        .decide(HOD, &id, StageAction::reject(StageName::Hod, "wrong department"))
        .await
        .expect("reject");

    let err = service
        .resubmit(OTHER_STAFF, &id, StageName::Hod)
        .await
        .expect_err("not the requester");
    assert!(matches!(err, AppError::UnauthorizedActor(_)));

    service
        .resubmit(ADMIN, &id, StageName::Hod)
        .await
        .expect("admin may resubmit");
}

#[tokio::test]
async fn completed_request_rejects_further_decisions() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;
    approve_through(&service, &id, StageName::IctOfficer).await;

    let err = service
        .decide(OFFICER_A, &id, StageAction::approve(StageName::IctOfficer))
        .await
        .expect_err("already complete");
    assert!(matches!(err, AppError::StageGateViolation(_)));

    let err = service
        .cancel(ADMIN, &id, None)
        .await
        .expect_err("cannot cancel completed");
    assert!(matches!(err, AppError::StageGateViolation(_)));
}

#[tokio::test]
async fn cancelled_request_is_terminal() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;
    approve_through(&service, &id, StageName::Hod).await;

    let request = service
        .cancel(STAFF, &id, Some("no longer needed".into()))
        .await
        .expect("requester cancels");
    let cancellation = request.cancellation.expect("cancellation recorded");
    assert_eq!(cancellation.reason.as_deref(), Some("no longer needed"));

    assert_eq!(
        service.status(&id).await.expect("status").current,
        CurrentStage::Cancelled
    );

    let err = service
        .decide(DIVISIONAL, &id, StageAction::approve(StageName::DivisionalDirector))
        .await
        .expect_err("cancelled");
    assert!(matches!(err, AppError::StageGateViolation(_)));

    let err = service
        .resubmit(STAFF, &id, StageName::Hod)
        .await
        .expect_err("cancelled");
    assert!(matches!(err, AppError::InvalidResubmission(_)));
}

#[tokio::test]
async fn unrelated_staff_cannot_cancel() {
    let (service, _db) = service().await;
    let id = submit_sample(&service).await;

    let err = service
        .cancel(OTHER_STAFF, &id, None)
        .await
        .expect_err("not the requester");
    assert!(matches!(err, AppError::UnauthorizedActor(_)));
}

#[tokio::test]
async fn staff_cannot_submit_for_someone_else() {
    let (service, _db) = service().await;
    let err = service
        .submit(OTHER_STAFF, sample_request())
        .await
        .expect_err("pf mismatch");
    assert!(matches!(err, AppError::UnauthorizedActor(_)));

    service
        .submit(ADMIN, sample_request())
        .await
        .expect("admin files on behalf of staff");
}

#[tokio::test]
async fn invalid_submission_is_rejected() {
    let (service, _db) = service().await;
    let mut input = sample_request();
    input.phone = "call me".into();

    let err = service.submit(STAFF, input).await.expect_err("bad phone");
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn status_of_unknown_request_is_not_found() {
    let (service, _db) = service().await;
    let err = service.status("missing").await.expect_err("missing");
    assert!(matches!(err, AppError::NotFound(_)));

    let err = service
        .decide(HOD, "missing", StageAction::approve(StageName::Hod))
        .await
        .expect_err("missing");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn workflow_events_are_audited() {
    let temp = tempfile::tempdir().expect("tempdir");
    let writer = Arc::new(JsonlAuditWriter::new(temp.path().to_path_buf()).expect("writer"));
    let db = Arc::new(
        access_workflow::persistence::db::connect_memory()
            .await
            .expect("db"),
    );
    let service = WorkflowService::new(db, Arc::new(resolver()))
        .with_audit(Arc::clone(&writer) as Arc<dyn AuditLogger>);

    let id = submit_sample(&service).await;
    service
        .decide(HOD, &id, StageAction::reject(StageName::Hod, "missing form"))
        .await
        .expect("reject");
    service
        .resubmit(STAFF, &id, StageName::Hod)
        .await
        .expect("resubmit");

    let raw = std::fs::read_to_string(writer.path_for(Utc::now().date_naive())).expect("audit file");
    let kinds: Vec<String> = raw
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).expect("json");
            value["event_type"].as_str().expect("string").to_owned()
        })
        .collect();
    assert_eq!(kinds, ["request_submitted", "stage_rejected", "resubmitted"]);
    assert!(raw.contains("missing form"));
}
