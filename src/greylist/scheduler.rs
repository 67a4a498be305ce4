use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use super::error::GreylistError;
use super::store::{GreylistRecord, GreylistStore};
use crate::smtp::{MailboxProbe, Rejection, SmtpOutcome};

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep between passes.
    pub poll_interval: Duration,
    pub base_delay: Duration,
    /// Attempts after which an address is dropped from the queue.
    pub max_attempts: u32,
    pub batch_size: u32,
    /// Upper bound on one probe; exceeding it counts as a temporary failure.
    pub probe_deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(120),
            base_delay: Duration::from_secs(600),
            max_attempts: 3,
            batch_size: 50,
            probe_deadline: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// `base_delay × 2^attempts`, saturating.
    pub fn backoff(&self, attempts: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.checked_pow(attempts).unwrap_or(u32::MAX))
    }
}

/// Counters for one scheduler pass.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Definitive answer received; entry removed.
    pub resolved: usize,
    pub rescheduled: usize,
    /// Attempt ceiling reached; entry removed.
    pub exhausted: usize,
    pub errors: usize,
}

impl PassSummary {
    pub fn processed(&self) -> usize {
        self.resolved + self.rescheduled + self.exhausted + self.errors
    }
}

enum Disposition {
    Resolved(SmtpOutcome),
    Rescheduled(GreylistRecord),
    Exhausted,
}

/// Drains due greylist entries by re-probing the exchanger that deferred them.
pub struct RetryScheduler {
    store: GreylistStore,
    prober: Arc<dyn MailboxProbe>,
    policy: RetryPolicy,
}

impl RetryScheduler {
    pub fn new(store: GreylistStore, prober: Arc<dyn MailboxProbe>, policy: RetryPolicy) -> Self {
        Self {
            store,
            prober,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn run_pass(&self) -> PassSummary {
        self.run_pass_at(Utc::now().timestamp()).await
    }

    /// Processes one batch of entries due at `now`. Failures are counted and
    /// logged; they never abort the pass.
    pub async fn run_pass_at(&self, now: i64) -> PassSummary {
        let mut summary = PassSummary::default();
        let due = match self.store.fetch_due_at(now, self.policy.batch_size).await {
            Ok(due) => due,
            Err(err) => {
                warn!(error = %err, "cannot fetch due greylist entries");
                summary.errors += 1;
                return summary;
            }
        };

        for record in due {
            match self.retry(&record, now).await {
                Ok(Disposition::Resolved(outcome)) => {
                    info!(address = %record.address, %outcome, "greylisted address resolved");
                    summary.resolved += 1;
                }
                Ok(Disposition::Rescheduled(next)) => {
                    debug!(
                        address = %next.address,
                        tries = next.attempt_count,
                        next_try = next.next_attempt,
                        "greylisted address rescheduled"
                    );
                    summary.rescheduled += 1;
                }
                Ok(Disposition::Exhausted) => {
                    info!(
                        address = %record.address,
                        tries = record.attempt_count,
                        "greylisted address dropped after final attempt"
                    );
                    summary.exhausted += 1;
                }
                Err(err) => {
                    warn!(address = %record.address, error = %err, "greylist retry failed");
                    summary.errors += 1;
                }
            }
        }
        summary
    }

    async fn retry(&self, record: &GreylistRecord, now: i64) -> Result<Disposition, GreylistError> {
        match self.attempt(record).await {
            Some(outcome @ (SmtpOutcome::Accepted | SmtpOutcome::Rejected(Rejection::Code(_)))) => {
                self.store.delete(&record.address).await?;
                Ok(Disposition::Resolved(outcome))
            }
            _ if record.attempt_count >= self.policy.max_attempts => {
                self.store.delete(&record.address).await?;
                Ok(Disposition::Exhausted)
            }
            _ => {
                let delay = self.policy.backoff(record.attempt_count);
                let next = self
                    .store
                    .upsert_at(&record.address, &record.mx_host, delay, now)
                    .await?;
                Ok(Disposition::Rescheduled(next))
            }
        }
    }

    /// Probes on a separate task so a panic or a stuck session cannot take
    /// the pass down. `None` means no answer within the deadline.
    async fn attempt(&self, record: &GreylistRecord) -> Option<SmtpOutcome> {
        let prober = Arc::clone(&self.prober);
        let host = record.mx_host.clone();
        let address = record.address.clone();
        let mut task = tokio::spawn(async move { prober.probe(&host, &address).await });

        match tokio::time::timeout(self.policy.probe_deadline, &mut task).await {
            Ok(Ok(outcome)) => Some(outcome),
            Ok(Err(err)) => {
                warn!(address = %record.address, error = %err, "probe task failed");
                None
            }
            Err(_) => {
                task.abort();
                warn!(
                    address = %record.address,
                    deadline = ?self.policy.probe_deadline,
                    "probe exceeded deadline"
                );
                None
            }
        }
    }

    /// Runs passes every `poll_interval` until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval = ?self.policy.poll_interval,
            max_attempts = self.policy.max_attempts,
            "retry scheduler started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                summary = self.run_pass() => {
                    if summary.processed() > 0 {
                        info!(
                            resolved = summary.resolved,
                            rescheduled = summary.rescheduled,
                            exhausted = summary.exhausted,
                            errors = summary.errors,
                            "retry pass finished"
                        );
                    }
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.policy.poll_interval) => {}
            }
        }
        info!("retry scheduler stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}
