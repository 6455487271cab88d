#![forbid(unsafe_code)]

//! `access-workflow`: operator CLI for the ICT access approval workflow.
//!
//! Loads configuration, opens the database, starts the notification
//! worker, runs one command, and prints its result as JSON on stdout.
//! Client errors exit with status 2, everything else with status 1.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use access_workflow::audit::JsonlAuditWriter;
use access_workflow::config::{GlobalConfig, NotificationConfig};
use access_workflow::identity::StaticIdentityResolver;
use access_workflow::models::request::NewAccessRequest;
use access_workflow::models::stage::StageName;
use access_workflow::notify::slack::SlackSink;
use access_workflow::notify::sms::SmsGatewaySink;
use access_workflow::notify::{LogSink, NotificationDispatcher, NotificationSink};
use access_workflow::persistence::db;
use access_workflow::persistence::notification_repo::NotificationRepo;
use access_workflow::workflow::{StageAction, WorkflowService};
use access_workflow::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "access-workflow", about = "ICT access request approval workflow", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Actor token identifying the caller.
    #[arg(long, env = "ACCESS_WORKFLOW_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit a new request read from a JSON file.
    Submit {
        /// JSON file holding the request fields.
        file: PathBuf,
    },
    /// Approve a stage.
    Approve {
        request_id: String,
        #[arg(long)]
        stage: StageName,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Reject a stage with a reason.
    Reject {
        request_id: String,
        #[arg(long)]
        stage: StageName,
        #[arg(long)]
        reason: String,
    },
    /// Reopen a rejected stage.
    Resubmit {
        request_id: String,
        #[arg(long)]
        stage: StageName,
    },
    /// Withdraw a request.
    Cancel {
        request_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Show a request and where it stands.
    Status { request_id: String },
    /// List requests the caller can act on.
    Queue,
    /// Assign an ICT officer to implement a request.
    Assign {
        request_id: String,
        /// PF number of the officer.
        #[arg(long)]
        officer: String,
    },
    /// Mark an assignment as started.
    StartTask { assignment_id: String },
    /// Mark an assignment as completed.
    CompleteTask {
        assignment_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Withdraw an assignment.
    CancelTask {
        assignment_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Re-send notifications that were never delivered.
    RetryNotifications,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to build tokio runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "command failed");
            eprintln!("{}", json!({ "error": err.to_string() }));
            if err.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(args: Cli) -> Result<Value> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    config.load_credentials().await?;
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.db_path).await?);
    info!(path = %config.db_path.display(), "database connected");

    let identity = Arc::new(StaticIdentityResolver::from_config(&config.actors));
    let mut service = WorkflowService::new(Arc::clone(&db), identity);

    if let Some(dir) = &config.audit_log_dir {
        service = service.with_audit(Arc::new(JsonlAuditWriter::new(dir.clone())?));
    }

    // ── Start notification worker ───────────────────────
    let ct = CancellationToken::new();
    let worker = if config.notifications.enabled {
        let sinks = build_sinks(&config.notifications)?;
        let (dispatcher, handle) = NotificationDispatcher::start(
            NotificationRepo::new(Arc::clone(&db)),
            sinks,
            &config.notifications,
            ct.clone(),
        );
        service = service.with_notifier(dispatcher);
        Some(handle)
    } else {
        info!("notifications disabled");
        None
    };

    let result = execute(&service, args.token.as_deref(), args.command).await;

    // Dropping the service closes the queue; the worker drains and exits.
    drop(service);
    if let Some(handle) = worker {
        tokio::select! {
            joined = handle => {
                if let Err(err) = joined {
                    error!(%err, "notification worker panicked");
                }
            }
            () = shutdown_signal() => {
                warn!("interrupted; undelivered notifications stay pending");
                ct.cancel();
            }
        }
    }

    result
}

async fn execute(service: &WorkflowService, token: Option<&str>, command: Command) -> Result<Value> {
    let caller = || {
        token.ok_or_else(|| {
            AppError::UnauthorizedActor("no actor token given (--token or ACCESS_WORKFLOW_TOKEN)".into())
        })
    };

    let output = match command {
        Command::Submit { file } => {
            let raw = std::fs::read_to_string(&file)
                .map_err(|err| AppError::Io(format!("cannot read {}: {err}", file.display())))?;
            let input: NewAccessRequest = serde_json::from_str(&raw)
                .map_err(|err| AppError::Validation(format!("invalid request file: {err}")))?;
            serde_json::to_value(service.submit(caller()?, input).await?)?
        }
        Command::Approve {
            request_id,
            stage,
            comment,
        } => {
            let mut action = StageAction::approve(stage);
            if let Some(comment) = comment {
                action = action.with_comment(comment);
            }
            serde_json::to_value(service.decide(caller()?, &request_id, action).await?)?
        }
        Command::Reject {
            request_id,
            stage,
            reason,
        } => {
            let action = StageAction::reject(stage, reason);
            serde_json::to_value(service.decide(caller()?, &request_id, action).await?)?
        }
        Command::Resubmit { request_id, stage } => {
            serde_json::to_value(service.resubmit(caller()?, &request_id, stage).await?)?
        }
        Command::Cancel { request_id, reason } => {
            serde_json::to_value(service.cancel(caller()?, &request_id, reason).await?)?
        }
        Command::Status { request_id } => serde_json::to_value(service.status(&request_id).await?)?,
        Command::Queue => serde_json::to_value(service.queue_for(caller()?).await?)?,
        Command::Assign {
            request_id,
            officer,
        } => serde_json::to_value(service.assign_task(caller()?, &request_id, &officer).await?)?,
        Command::StartTask { assignment_id } => {
            serde_json::to_value(service.start_task(caller()?, &assignment_id).await?)?
        }
        Command::CompleteTask {
            assignment_id,
            notes,
        } => serde_json::to_value(service.complete_task(caller()?, &assignment_id, notes).await?)?,
        Command::CancelTask {
            assignment_id,
            reason,
        } => serde_json::to_value(service.cancel_task(caller()?, &assignment_id, reason).await?)?,
        Command::RetryNotifications => {
            json!({ "requeued": service.retry_notifications().await? })
        }
    };
    Ok(output)
}

fn build_sinks(config: &NotificationConfig) -> Result<Vec<Arc<dyn NotificationSink>>> {
    let mut sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(LogSink)];
    if let Some(slack) = &config.slack {
        sinks.push(Arc::new(SlackSink::new(slack)?));
        info!(channel = %slack.channel_id, "slack sink enabled");
    }
    if let Some(sms) = &config.sms {
        sinks.push(Arc::new(SmsGatewaySink::new(sms)?));
        info!(gateway = %sms.gateway_url, "sms sink enabled");
    }
    Ok(sinks)
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
