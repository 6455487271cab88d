//! Unit tests for `GlobalConfig` parsing and validation.

use std::time::Duration;

use access_workflow::config::GlobalConfig;
use access_workflow::models::actor::Role;

fn sample_toml() -> String {
    r#"
db_path = "data/workflow.db"
audit_log_dir = "logs/audit"

[notifications]
max_attempts = 5
retry_base_delay_ms = 250

[notifications.slack]
channel_id = "C_ICT"

[notifications.sms]
gateway_url = "https://sms.example.org/api/send"
sender_id = "HOSP-ICT"

[[actors]]
token = "tok-hod"
role = "hod"
name = "Dr. Mwamba"
pf_number = "PF1001"
signature_ref = "sig/hod.png"

[[actors]]
token = "tok-staff"
role = "staff"
name = "Asha Juma"
pf_number = "PF2001"
"#
    .to_owned()
}

#[test]
fn parses_full_config() {
    let config = GlobalConfig::from_toml_str(&sample_toml()).expect("config parses");

    assert_eq!(config.db_path.to_str(), Some("data/workflow.db"));
    assert_eq!(
        config.audit_log_dir.as_deref().and_then(|p| p.to_str()),
        Some("logs/audit")
    );
    assert!(config.notifications.enabled);
    assert_eq!(config.notifications.max_attempts, 5);
    assert_eq!(
        config.notifications.retry_base_delay(),
        Duration::from_millis(250)
    );
    assert_eq!(
        config.notifications.slack.as_ref().map(|s| s.channel_id.as_str()),
        Some("C_ICT")
    );
    assert_eq!(config.actors.len(), 2);
    assert_eq!(config.actors[0].role, Role::Hod);
}

#[test]
fn secrets_are_never_read_from_file() {
    let config = GlobalConfig::from_toml_str(&sample_toml()).expect("config parses");
    let slack = config.notifications.slack.expect("slack section");
    let sms = config.notifications.sms.expect("sms section");
    assert!(slack.bot_token.is_empty());
    assert!(sms.api_key.is_empty());
}

#[test]
fn notification_section_is_optional() {
    let toml = r#"
db_path = "workflow.db"

[[actors]]
token = "tok-admin"
role = "admin"
name = "Registry Admin"
"#;
    let config = GlobalConfig::from_toml_str(toml).expect("config parses");
    assert!(config.notifications.enabled);
    assert_eq!(config.notifications.max_attempts, 3);
    assert_eq!(config.notifications.queue_capacity, 256);
    assert!(config.notifications.slack.is_none());
    assert!(config.notifications.sms.is_none());
    assert!(config.audit_log_dir.is_none());
}

#[test]
fn actor_config_resolves_to_actor() {
    let config = GlobalConfig::from_toml_str(&sample_toml()).expect("config parses");
    let actor = config.actors[0].to_actor();
    assert_eq!(actor.role, Role::Hod);
    assert_eq!(actor.name, "Dr. Mwamba");
    assert_eq!(actor.pf_number.as_deref(), Some("PF1001"));
    assert_eq!(actor.signature_ref.as_deref(), Some("sig/hod.png"));
}

#[test]
fn empty_actor_list_is_rejected() {
    let toml = "db_path = \"workflow.db\"\nactors = []\n";
    let err = GlobalConfig::from_toml_str(toml).expect_err("must reject");
    assert!(err.to_string().contains("actors must not be empty"));
}

#[test]
fn duplicate_tokens_are_rejected() {
    let toml = r#"
db_path = "workflow.db"

[[actors]]
token = "same"
role = "hod"
name = "A"

[[actors]]
token = "same"
role = "ict_director"
name = "B"
"#;
    let err = GlobalConfig::from_toml_str(toml).expect_err("must reject");
    assert!(err.to_string().contains("duplicate actor token"));
}

#[test]
fn blank_token_is_rejected() {
    let toml = r#"
db_path = "workflow.db"

[[actors]]
token = "  "
role = "hod"
name = "A"
"#;
    let err = GlobalConfig::from_toml_str(toml).expect_err("must reject");
    assert!(err.to_string().contains("empty token"));
}

#[test]
fn zero_max_attempts_is_rejected() {
    let toml = r#"
db_path = "workflow.db"

[notifications]
max_attempts = 0

[[actors]]
token = "t"
role = "hod"
name = "A"
"#;
    let err = GlobalConfig::from_toml_str(toml).expect_err("must reject");
    assert!(err.to_string().contains("max_attempts"));
}

#[test]
fn malformed_gateway_url_is_rejected() {
    let toml = r#"
db_path = "workflow.db"

[notifications.sms]
gateway_url = "not a url"
sender_id = "HOSP"

[[actors]]
token = "t"
role = "hod"
name = "A"
"#;
    let err = GlobalConfig::from_toml_str(toml).expect_err("must reject");
    assert!(err.to_string().contains("gateway_url"));
}

#[test]
fn unknown_role_is_rejected() {
    let toml = r#"
db_path = "workflow.db"

[[actors]]
token = "t"
role = "janitor"
name = "A"
"#;
    let err = GlobalConfig::from_toml_str(toml).expect_err("must reject");
    assert!(err.to_string().starts_with("config:"));
}

#[test]
fn load_from_path_reads_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, sample_toml()).expect("write config");

    let config = GlobalConfig::load_from_path(&path).expect("config loads");
    assert_eq!(config.actors.len(), 2);
}

#[test]
fn load_from_missing_path_is_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = GlobalConfig::load_from_path(temp.path().join("absent.toml")).expect_err("missing");
    assert!(err.to_string().starts_with("config:"));
}
