//! Stage transition notifications.
//!
//! Provides the [`NotificationSink`] trait, the concrete sinks, and the
//! [`NotificationDispatcher`] that persists a delivery record per event and
//! delivers it from a background worker. Delivery is best-effort: callers
//! never see a sink failure, only the recorded delivery status does.

pub mod dispatcher;
pub mod slack;
pub mod sms;

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::models::notification::StageTransitioned;
use crate::Result;

pub use dispatcher::NotificationDispatcher;

/// Destination for stage transition notifications.
///
/// Implementations must be [`Send`] and [`Sync`] so the delivery worker can
/// hold them across tasks.
pub trait NotificationSink: Send + Sync {
    /// Short sink name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Notify` if the destination rejected or could not
    /// be reached.
    fn deliver<'a>(
        &'a self,
        event: &'a StageTransitioned,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Sink that writes each event to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn deliver<'a>(
        &'a self,
        event: &'a StageTransitioned,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            info!(
                request_id = %event.request_id,
                stage = %event.stage,
                decision = event.decision.as_str(),
                actor = %event.actor_name,
                "{}",
                event.summary()
            );
            Ok(())
        })
    }
}
