//! Shared fixtures for service-level integration tests.
//!
//! Provides a fixed cast of actors, an in-memory `WorkflowService`, and a
//! helper that walks a request through the approval stages.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use access_workflow::identity::StaticIdentityResolver;
use access_workflow::models::actor::{Actor, Role};
use access_workflow::models::request::{
    AccessRequest, AccessType, NewAccessRequest, RequestSubject, ServiceKind,
};
use access_workflow::models::stage::StageName;
use access_workflow::persistence::db::{self, Database};
use access_workflow::workflow::{StageAction, WorkflowService};

pub const STAFF: &str = "tok-staff";
pub const OTHER_STAFF: &str = "tok-other-staff";
pub const HOD: &str = "tok-hod";
pub const DIVISIONAL: &str = "tok-divisional";
pub const ICT_DIRECTOR: &str = "tok-ict-director";
pub const HEAD_OF_IT: &str = "tok-head-of-it";
pub const OFFICER_A: &str = "tok-officer-a";
pub const OFFICER_B: &str = "tok-officer-b";
pub const ADMIN: &str = "tok-admin";

pub const STAFF_PF: &str = "PF2001";
pub const OFFICER_A_PF: &str = "PF9100";
pub const OFFICER_B_PF: &str = "PF9200";
pub const HOD_PF: &str = "PF1001";

/// Resolver holding one actor per role, plus a second staff member and
/// a second ICT officer.
pub fn resolver() -> StaticIdentityResolver {
    StaticIdentityResolver::default()
        .with_actor(STAFF, Actor::new(Role::Staff, "Asha Juma").with_pf_number(STAFF_PF))
        .with_actor(
            OTHER_STAFF,
            Actor::new(Role::Staff, "Neema Said").with_pf_number("PF2002"),
        )
        .with_actor(
            HOD,
            Actor::new(Role::Hod, "Dr. Mwamba")
                .with_pf_number(HOD_PF)
                .with_signature("sig/hod.png"),
        )
        .with_actor(
            DIVISIONAL,
            Actor::new(Role::DivisionalDirector, "Dr. Kileo").with_pf_number("PF1002"),
        )
        .with_actor(
            ICT_DIRECTOR,
            Actor::new(Role::IctDirector, "Eng. Kweka").with_pf_number("PF1003"),
        )
        .with_actor(
            HEAD_OF_IT,
            Actor::new(Role::HeadOfIt, "Mr. Lyimo").with_pf_number("PF1004"),
        )
        .with_actor(
            OFFICER_A,
            Actor::new(Role::IctOfficer, "Baraka Mushi").with_pf_number(OFFICER_A_PF),
        )
        .with_actor(
            OFFICER_B,
            Actor::new(Role::IctOfficer, "Zawadi Mrema").with_pf_number(OFFICER_B_PF),
        )
        .with_actor(ADMIN, Actor::new(Role::Admin, "Registry Admin"))
}

/// In-memory database plus a service with no notifier or audit trail.
pub async fn service() -> (WorkflowService, Arc<Database>) {
    let db = Arc::new(db::connect_memory().await.expect("db"));
    let service = WorkflowService::new(Arc::clone(&db), Arc::new(resolver()));
    (service, db)
}

/// A valid request from the `STAFF` actor.
pub fn sample_request() -> NewAccessRequest {
    NewAccessRequest {
        pf_number: STAFF_PF.to_owned(),
        staff_name: "Asha Juma".to_owned(),
        phone: "+255712345678".to_owned(),
        department: "Radiology".to_owned(),
        subject: RequestSubject::SystemAccess {
            services: BTreeSet::from([ServiceKind::Jeeva, ServiceKind::Internet]),
            modules: vec!["radiology".to_owned()],
        },
        access_type: AccessType::Permanent,
    }
}

/// Token of the actor who decides `stage`.
pub fn token_for(stage: StageName) -> &'static str {
    match stage {
        StageName::Hod => HOD,
        StageName::DivisionalDirector => DIVISIONAL,
        StageName::IctDirector => ICT_DIRECTOR,
        StageName::HeadOfIt => HEAD_OF_IT,
        StageName::IctOfficer => OFFICER_A,
    }
}

/// Approve every stage from the first up to and including `last`.
pub async fn approve_through(
    service: &WorkflowService,
    request_id: &str,
    last: StageName,
) -> AccessRequest {
    let mut latest = None;
    for stage in StageName::SEQUENCE {
        let request = service
            .decide(token_for(stage), request_id, StageAction::approve(stage))
            .await
            .unwrap_or_else(|err| panic!("approve {stage}: {err}"));
        latest = Some(request);
        if stage == last {
            break;
        }
    }
    latest.expect("at least one stage approved")
}

/// Submit `sample_request` as `STAFF` and return its id.
pub async fn submit_sample(service: &WorkflowService) -> String {
    service
        .submit(STAFF, sample_request())
        .await
        .expect("submit")
        .id
}
