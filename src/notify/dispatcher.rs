//! Queued notification delivery with persisted status and retry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::NotificationSink;
use crate::config::NotificationConfig;
use crate::models::notification::{DeliveryStatus, NotificationRecord, StageTransitioned};
use crate::persistence::notification_repo::NotificationRepo;
use crate::{AppError, Result};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Handle for queueing notifications; cheap to clone.
#[derive(Clone)]
pub struct NotificationDispatcher {
    repo: NotificationRepo,
    queue_tx: mpsc::Sender<NotificationRecord>,
}

struct Worker {
    repo: NotificationRepo,
    sinks: Vec<Arc<dyn NotificationSink>>,
    max_attempts: u32,
    base_delay: Duration,
}

impl NotificationDispatcher {
    /// Start the background delivery worker.
    ///
    /// The worker stops when `cancel` fires or every handle is dropped.
    /// Records still queued at that point stay `pending` in the database.
    #[must_use]
    pub fn start(
        repo: NotificationRepo,
        sinks: Vec<Arc<dyn NotificationSink>>,
        config: &NotificationConfig,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let worker = Worker {
            repo: repo.clone(),
            sinks,
            max_attempts: config.max_attempts,
            base_delay: config.retry_base_delay(),
        };
        let handle = tokio::spawn(worker.run(queue_rx, cancel));
        (Self { repo, queue_tx }, handle)
    }

    /// Record and queue an event for delivery.
    ///
    /// Never fails: persistence or queue errors are logged and the event is
    /// left for [`Self::retry_undelivered`] where possible.
    pub async fn notify(&self, event: StageTransitioned) {
        let record = NotificationRecord::new(event);
        if let Err(err) = self.repo.insert(&record).await {
            error!(
                request_id = %record.event.request_id,
                %err,
                "failed to record notification; event dropped"
            );
            return;
        }
        if let Err(err) = self.queue_tx.try_send(record) {
            warn!(%err, "notification queue unavailable; record left pending");
        }
    }

    /// Re-queue every record that is pending or failed.
    ///
    /// Returns the number of records queued. The worker skips any copy
    /// whose record was sent by the time it is dequeued.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if listing fails, or `AppError::Notify` if
    /// the worker has stopped.
    pub async fn retry_undelivered(&self) -> Result<usize> {
        let records = self.repo.list_undelivered().await?;
        let count = records.len();
        for record in records {
            self.queue_tx
                .send(record)
                .await
                .map_err(|err| AppError::Notify(format!("delivery worker stopped: {err}")))?;
        }
        info!(count, "re-queued undelivered notifications");
        Ok(count)
    }
}

impl Worker {
    async fn run(self, mut queue_rx: mpsc::Receiver<NotificationRecord>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("notification worker shutting down");
                    break;
                }
                next = queue_rx.recv() => {
                    let Some(record) = next else { break };
                    if self.already_sent(&record.id).await {
                        continue;
                    }
                    self.deliver_with_retry(&record).await;
                }
            }
        }
        info!("notification worker exiting");
    }

    /// A record can be queued twice when a retry lists it while its first
    /// delivery is still queued. Deliveries run one at a time, so the later
    /// copy sees the earlier outcome here.
    async fn already_sent(&self, id: &str) -> bool {
        match self.repo.get_by_id(id).await {
            Ok(Some(stored)) if stored.status == DeliveryStatus::Sent => {
                debug!(notification_id = %id, "notification already sent; skipping");
                true
            }
            Ok(_) => false,
            Err(err) => {
                warn!(notification_id = %id, %err, "failed to reload notification; delivering anyway");
                false
            }
        }
    }

    async fn deliver_with_retry(&self, record: &NotificationRecord) {
        let mut backoff = self.base_delay;
        for attempt in 1..=self.max_attempts {
            match self.deliver_once(&record.event).await {
                Ok(()) => {
                    if let Err(err) = self
                        .repo
                        .record_attempt(&record.id, DeliveryStatus::Sent, None)
                        .await
                    {
                        error!(notification_id = %record.id, %err, "failed to mark notification sent");
                    }
                    info!(notification_id = %record.id, attempt, "notification delivered");
                    return;
                }
                Err(err) => {
                    let exhausted = attempt == self.max_attempts;
                    let status = if exhausted {
                        DeliveryStatus::Failed
                    } else {
                        DeliveryStatus::Pending
                    };
                    let message = err.to_string();
                    if let Err(db_err) = self
                        .repo
                        .record_attempt(&record.id, status, Some(&message))
                        .await
                    {
                        error!(notification_id = %record.id, %db_err, "failed to record delivery attempt");
                    }
                    warn!(notification_id = %record.id, attempt, %err, "notification delivery failed");
                    if exhausted {
                        return;
                    }
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_RETRY_DELAY);
                }
            }
        }
    }

    async fn deliver_once(&self, event: &StageTransitioned) -> Result<()> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(err) = sink.deliver(event).await {
                failures.push(format!("{}: {err}", sink.name()));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AppError::Notify(failures.join("; ")))
        }
    }
}
