//! Outbox dispatcher loop.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cardissue_events::MessagePublisher;

use crate::config::DispatcherConfig;
use crate::store::{OutboxEntry, OutboxStore, StoreError};

/// Result of dispatching one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Published and marked sent.
    Sent,
    /// Retries exhausted; the entry stays pending for the next cycle.
    PermanentDispatchFailure { attempts: u32, last_error: String },
    /// Cancellation arrived before a publish was confirmed; the entry stays pending.
    Cancelled,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub sent: usize,
    pub failed: usize,
    pub purged: usize,
    pub cancelled: bool,
}

/// Cumulative dispatcher statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatcherStats {
    pub cycles: u64,
    pub entries_sent: u64,
    pub entries_failed: u64,
    pub entries_purged: u64,
    pub store_errors: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl DispatcherStats {
    fn record(&mut self, report: &CycleReport, at: DateTime<Utc>) {
        self.cycles += 1;
        self.entries_sent += report.sent as u64;
        self.entries_failed += report.failed as u64;
        self.entries_purged += report.purged as u64;
        self.last_cycle_at = Some(at);
    }
}

/// Handle to control a running dispatcher.
#[derive(Debug)]
pub struct DispatcherHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
    stats: Arc<Mutex<DispatcherStats>>,
}

impl DispatcherHandle {
    /// Request shutdown, wait for the loop to exit and return the final statistics.
    pub async fn shutdown(self) -> DispatcherStats {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            error!(error = %e, "outbox dispatcher task failed");
        }
        snapshot(&self.stats)
    }

    /// Get current dispatcher statistics.
    pub fn stats(&self) -> DispatcherStats {
        snapshot(&self.stats)
    }
}

fn snapshot(stats: &Mutex<DispatcherStats>) -> DispatcherStats {
    stats
        .lock()
        .map(|s| s.clone())
        .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
}

/// Background publisher for the transactional outbox.
///
/// Assumes a single instance per outbox; running several would publish the
/// same entries concurrently.
pub struct OutboxDispatcher<O, P> {
    store: Arc<O>,
    publisher: Arc<P>,
    config: DispatcherConfig,
}

impl<O, P> OutboxDispatcher<O, P>
where
    O: OutboxStore + 'static,
    P: MessagePublisher + 'static,
{
    pub fn new(store: Arc<O>, publisher: Arc<P>, config: DispatcherConfig) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    /// Run the loop on the current tokio runtime until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> DispatcherHandle {
        let stats = Arc::new(Mutex::new(DispatcherStats::default()));
        let stats_clone = stats.clone();
        let token = cancel.clone();

        let join = tokio::spawn(async move {
            self.run(token, stats_clone).await;
        });

        DispatcherHandle {
            cancel,
            join,
            stats,
        }
    }

    async fn run(self, cancel: CancellationToken, stats: Arc<Mutex<DispatcherStats>>) {
        info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "outbox dispatcher started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.run_cycle(&cancel).await {
                Ok(report) => {
                    if let Ok(mut s) = stats.lock() {
                        s.record(&report, Utc::now());
                    }
                    if report.fetched > 0 || report.purged > 0 {
                        debug!(
                            fetched = report.fetched,
                            sent = report.sent,
                            failed = report.failed,
                            purged = report.purged,
                            "outbox cycle finished"
                        );
                    }
                    if report.cancelled {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "outbox cycle failed");
                    if let Ok(mut s) = stats.lock() {
                        s.store_errors += 1;
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("outbox dispatcher stopped");
    }

    /// One dispatch phase followed by one retention phase.
    ///
    /// Fails only when pending entries cannot be fetched. Per-entry failures are
    /// counted in the report and never stop the batch.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport, StoreError> {
        let mut report = CycleReport::default();

        let batch = tokio::select! {
            _ = cancel.cancelled() => {
                report.cancelled = true;
                return Ok(report);
            }
            batch = self.store.fetch_pending(self.config.batch_size) => batch?,
        };
        report.fetched = batch.len();

        for entry in &batch {
            match self.dispatch_entry(entry, cancel).await {
                Ok(DispatchOutcome::Sent) => report.sent += 1,
                Ok(DispatchOutcome::PermanentDispatchFailure { attempts, last_error }) => {
                    report.failed += 1;
                    error!(
                        entry_id = %entry.id,
                        topic = %entry.topic,
                        attempts,
                        error = %last_error,
                        "outbox entry not delivered, leaving pending"
                    );
                }
                Ok(DispatchOutcome::Cancelled) => {
                    report.cancelled = true;
                    return Ok(report);
                }
                Err(e) => {
                    report.failed += 1;
                    error!(entry_id = %entry.id, error = %e, "failed to mark outbox entry sent");
                }
            }
        }

        let cutoff = Utc::now() - self.config.retention();
        tokio::select! {
            _ = cancel.cancelled() => report.cancelled = true,
            purged = self.store.purge_sent_before(cutoff) => match purged {
                Ok(n) => {
                    report.purged = n;
                    if n > 0 {
                        info!(purged = n, cutoff = %cutoff, "purged sent outbox entries");
                    }
                }
                Err(e) => error!(error = %e, "outbox retention sweep failed"),
            },
        }

        Ok(report)
    }

    /// Publish one entry with bounded retry, then mark it sent.
    ///
    /// Marking sent is not raced against cancellation: once the transport has
    /// confirmed a publish, it is recorded.
    pub async fn dispatch_entry(
        &self,
        entry: &OutboxEntry,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, StoreError> {
        let policy = &self.config.retry;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let published = tokio::select! {
                _ = cancel.cancelled() => return Ok(DispatchOutcome::Cancelled),
                r = self.publisher.publish(&entry.topic, &entry.payload) => r,
            };

            match published {
                Ok(()) => {
                    self.store.mark_sent(entry.id, Utc::now()).await?;
                    debug!(entry_id = %entry.id, topic = %entry.topic, attempt, "outbox entry sent");
                    return Ok(DispatchOutcome::Sent);
                }
                Err(e) => {
                    if !policy.should_retry(attempt) {
                        return Ok(DispatchOutcome::PermanentDispatchFailure {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }

                    let delay = policy.delay_after(attempt);
                    warn!(
                        entry_id = %entry.id,
                        topic = %entry.topic,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "publish failed, backing off"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(DispatchOutcome::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
