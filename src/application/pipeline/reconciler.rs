//! Periodic repair of denormalized counters.
//!
//! `applications.chats_count` and `chats.messages_count` are never
//! incremented on the write path. They are recomputed from source rows on a
//! fixed interval, which also heals drift left by tasks that never reached
//! the primary store. Optionally the sequence counters are raised to the
//! highest persisted number, so numbers are not reissued after the counter
//! store lost its data.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::sequence::SequenceAllocator;
use crate::domain::CounterRepository;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Rows and counters changed by one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub applications_corrected: u64,
    pub chats_corrected: u64,
    pub sequences_raised: u64,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

pub struct Reconciler {
    counters: Arc<dyn CounterRepository>,
    sequences: Option<Arc<dyn SequenceAllocator>>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(counters: Arc<dyn CounterRepository>, interval: Duration) -> Self {
        Self {
            counters,
            sequences: None,
            interval,
        }
    }

    /// Also raise sequence counters to the highest persisted number.
    pub fn with_sequence_sync(mut self, sequences: Arc<dyn SequenceAllocator>) -> Self {
        self.sequences = Some(sequences);
        self
    }

    /// Recompute every counter once.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconcileReport, AppError> {
        let mut report = ReconcileReport {
            applications_corrected: self.counters.recompute_chats_counts().await?,
            chats_corrected: self.counters.recompute_messages_counts().await?,
            sequences_raised: 0,
        };

        if let Some(sequences) = &self.sequences {
            for floor in self.counters.sequence_floors().await? {
                if sequences.ensure_at_least(floor.scope, floor.max_number).await? {
                    warn!(
                        scope = %floor.scope,
                        floor = floor.max_number,
                        "Sequence counter was behind persisted rows, raised"
                    );
                    report.sequences_raised += 1;
                }
            }
        }

        Ok(report)
    }

    /// Reconcile every interval until `cancel` fires.
    ///
    /// The first run happens one full interval after start. A failed run is
    /// logged and retried on the next tick.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "Reconciler started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.reconcile().await {
                Ok(report) => {
                    metrics::record_reconcile(
                        "ok",
                        report.applications_corrected,
                        report.chats_corrected,
                        report.sequences_raised,
                    );
                    if report.is_clean() {
                        info!("Counters reconciled, no drift");
                    } else {
                        info!(
                            applications = report.applications_corrected,
                            chats = report.chats_corrected,
                            sequences = report.sequences_raised,
                            "Counters reconciled"
                        );
                    }
                }
                Err(e) => {
                    metrics::record_reconcile("error", 0, 0, 0);
                    error!(error = %e, "Error updating counts");
                }
            }
        }

        info!("Reconciler stopped");
    }
}
