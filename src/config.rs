//! Global configuration parsing, validation, and credential loading.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::models::actor::{Actor, Role};
use crate::{AppError, Result};

/// Keychain service name under which secrets are stored.
pub const KEYRING_SERVICE: &str = "access-workflow";

/// Slack channel notification sink.
///
/// The bot token is loaded at runtime via OS keychain or environment
/// variable, never from the TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// Channel where stage transitions are posted.
    pub channel_id: String,
    /// Bot user token (populated at runtime).
    #[serde(skip)]
    pub bot_token: String,
}

/// HTTP SMS gateway notification sink.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SmsConfig {
    /// Gateway endpoint accepting a JSON `POST`.
    pub gateway_url: String,
    /// Sender ID shown on the handset.
    pub sender_id: String,
    /// Gateway API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

/// Notification dispatch settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NotificationConfig {
    /// Whether stage transitions are dispatched at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delivery attempts per record before it is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial retry delay in milliseconds; doubles per attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Bounded queue size between callers and the delivery worker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Optional Slack sink.
    pub slack: Option<SlackConfig>,
    /// Optional SMS sink.
    pub sms: Option<SmsConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            queue_capacity: default_queue_capacity(),
            slack: None,
            sms: None,
        }
    }
}

impl NotificationConfig {
    /// Initial retry delay.
    #[must_use]
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// One known actor and the opaque token that identifies them.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ActorConfig {
    /// Opaque token presented by the caller.
    pub token: String,
    /// Workflow role.
    pub role: Role,
    /// Display name.
    pub name: String,
    /// Staff PF number.
    pub pf_number: Option<String>,
    /// Stored signature reference.
    pub signature_ref: Option<String>,
}

impl ActorConfig {
    /// Identity this entry resolves to.
    #[must_use]
    pub fn to_actor(&self) -> Actor {
        Actor {
            role: self.role,
            name: self.name.clone(),
            pf_number: self.pf_number.clone(),
            signature_ref: self.signature_ref.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_queue_capacity() -> usize {
    256
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file.
    pub db_path: PathBuf,
    /// Directory for daily JSONL audit files; auditing is off when unset.
    pub audit_log_dir: Option<PathBuf>,
    /// Notification dispatch settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Known actors.
    pub actors: Vec<ActorConfig>,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load sink secrets from OS keychain with env-var fallback.
    ///
    /// Only sinks present in the config are resolved.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a configured sink's secret is missing
    /// from both the keychain and the environment.
    pub async fn load_credentials(&mut self) -> Result<()> {
        if let Some(slack) = self.notifications.slack.as_mut() {
            slack.bot_token = load_credential("slack_bot_token", "SLACK_BOT_TOKEN").await?;
        }
        if let Some(sms) = self.notifications.sms.as_mut() {
            sms.api_key = load_credential("sms_api_key", "SMS_API_KEY").await?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.actors.is_empty() {
            return Err(AppError::Config("actors must not be empty".into()));
        }

        let mut tokens = HashSet::new();
        for actor in &self.actors {
            if actor.token.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "actor {} has an empty token",
                    actor.name
                )));
            }
            if !tokens.insert(actor.token.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate actor token for {}",
                    actor.name
                )));
            }
        }

        if self.notifications.max_attempts == 0 {
            return Err(AppError::Config(
                "notifications.max_attempts must be greater than zero".into(),
            ));
        }
        if self.notifications.queue_capacity == 0 {
            return Err(AppError::Config(
                "notifications.queue_capacity must be greater than zero".into(),
            ));
        }
        if let Some(sms) = &self.notifications.sms {
            reqwest::Url::parse(&sms.gateway_url).map_err(|err| {
                AppError::Config(format!("notifications.sms.gateway_url invalid: {err}"))
            })?;
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    match env::var(env_key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))),
    }
}
