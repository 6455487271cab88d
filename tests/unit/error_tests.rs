//! Unit tests for `AppError` display format and client/server classification.

use access_workflow::AppError;

#[test]
fn display_uses_kind_prefix() {
    let cases = [
        (AppError::StageGateViolation("x".into()), "stage gate violation: x"),
        (AppError::InvalidResubmission("x".into()), "invalid resubmission: x"),
        (AppError::AlreadyAssigned("x".into()), "already assigned: x"),
        (AppError::UnauthorizedActor("x".into()), "unauthorized actor: x"),
        (AppError::InvalidTransition("x".into()), "invalid transition: x"),
        (AppError::Validation("x".into()), "validation: x"),
        (AppError::NotFound("x".into()), "not found: x"),
        (AppError::Conflict("x".into()), "conflict: x"),
        (AppError::Config("x".into()), "config: x"),
        (AppError::Db("x".into()), "db: x"),
        (AppError::Notify("x".into()), "notify: x"),
        (AppError::Io("x".into()), "io: x"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn workflow_rule_errors_are_client_errors() {
    assert!(AppError::StageGateViolation("hod pending".into()).is_client_error());
    assert!(AppError::InvalidResubmission("not rejected".into()).is_client_error());
    assert!(AppError::AlreadyAssigned("busy".into()).is_client_error());
    assert!(AppError::UnauthorizedActor("wrong role".into()).is_client_error());
    assert!(AppError::InvalidTransition("completed".into()).is_client_error());
    assert!(AppError::Validation("bad phone".into()).is_client_error());
    assert!(AppError::NotFound("missing".into()).is_client_error());
}

#[test]
fn infrastructure_errors_are_not_client_errors() {
    assert!(!AppError::Conflict("raced".into()).is_client_error());
    assert!(!AppError::Config("bad".into()).is_client_error());
    assert!(!AppError::Db("locked".into()).is_client_error());
    assert!(!AppError::Notify("timeout".into()).is_client_error());
    assert!(!AppError::Io("disk full".into()).is_client_error());
}

#[test]
fn invalid_toml_maps_to_config_error() {
    let err: AppError = toml::from_str::<toml::Value>("= nope").unwrap_err().into();
    assert!(err.to_string().starts_with("config:"));
}
