//! Ledger retention worker.
//!
//! Idempotency records only need to outlive the bus's redelivery horizon;
//! this worker sweeps entries past the retention window on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::stores::DeliveryLedger;

#[derive(Debug, Clone)]
pub struct CleanupWorkerConfig {
    pub interval: Duration,
    pub ledger_retention_days: i32,
}

impl Default for CleanupWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            ledger_retention_days: 30,
        }
    }
}

pub struct CleanupWorker<L> {
    ledger: Arc<L>,
    config: CleanupWorkerConfig,
}

impl<L: DeliveryLedger> CleanupWorker<L> {
    pub fn new(ledger: Arc<L>, config: CleanupWorkerConfig) -> Self {
        Self { ledger, config }
    }

    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            ledger_retention_days = self.config.ledger_retention_days,
            "Starting ledger cleanup worker"
        );

        let mut interval = tokio::time::interval(self.config.interval);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.ledger.sweep_expired(self.config.ledger_retention_days).await {
                        Ok(count) => {
                            if count > 0 {
                                info!(deleted = count, "Swept expired delivery records");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to sweep delivery records");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Cleanup worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
