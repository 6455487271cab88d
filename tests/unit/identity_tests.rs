//! Unit tests for `StaticIdentityResolver`.

use access_workflow::config::ActorConfig;
use access_workflow::identity::{IdentityResolver, StaticIdentityResolver};
use access_workflow::models::actor::{Actor, Role};
use access_workflow::AppError;

fn actors() -> Vec<ActorConfig> {
    vec![
        ActorConfig {
            token: "tok-hit".into(),
            role: Role::HeadOfIt,
            name: "Head of IT".into(),
            pf_number: Some("PF9000".into()),
            signature_ref: None,
        },
        ActorConfig {
            token: "tok-officer".into(),
            role: Role::IctOfficer,
            name: "Officer Baraka".into(),
            pf_number: Some("PF9100".into()),
            signature_ref: Some("sig/baraka.png".into()),
        },
    ]
}

#[test]
fn resolves_known_token() {
    let resolver = StaticIdentityResolver::from_config(&actors());
    let actor = resolver.resolve("tok-officer").expect("known token");
    assert_eq!(actor.role, Role::IctOfficer);
    assert_eq!(actor.name, "Officer Baraka");
    assert_eq!(actor.signature_ref.as_deref(), Some("sig/baraka.png"));
}

#[test]
fn unknown_token_is_unauthorized() {
    let resolver = StaticIdentityResolver::from_config(&actors());
    let err = resolver.resolve("forged").expect_err("unknown token");
    assert!(matches!(err, AppError::UnauthorizedActor(_)));
}

#[test]
fn lookup_by_pf_number_ignores_case() {
    let resolver = StaticIdentityResolver::from_config(&actors());
    let actor = resolver.lookup("pf9100").expect("officer found");
    assert_eq!(actor.name, "Officer Baraka");
}

#[test]
fn lookup_unknown_pf_number_is_not_found() {
    let resolver = StaticIdentityResolver::from_config(&actors());
    let err = resolver.lookup("PF0000").expect_err("no such officer");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn with_actor_registers_extra_identity() {
    let resolver = StaticIdentityResolver::default()
        .with_actor("tok-x", Actor::new(Role::Admin, "Registry Admin"));
    assert_eq!(resolver.resolve("tok-x").expect("registered").role, Role::Admin);
}
