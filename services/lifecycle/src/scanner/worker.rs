//! Scan scheduling worker.
//!
//! Runs the expiration scan on a recurring wall-clock schedule: once daily
//! at a configured local hour. The scanner's own guard covers the case of a
//! trigger firing before the previous scan finished.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::{ExpirationScanner, ScanError};
use crate::bus::EventPublisher;
use crate::stores::{ProjectDirectory, SecretStore};

/// Default local hour (0-23) of the daily scan.
pub const DEFAULT_SCAN_HOUR: u32 = 9;

/// Worker driving the daily scan trigger.
pub struct ScannerWorker<S, P, B> {
    scanner: Arc<ExpirationScanner<S, P, B>>,
    scan_hour: u32,
}

impl<S, P, B> ScannerWorker<S, P, B>
where
    S: SecretStore,
    P: ProjectDirectory,
    B: EventPublisher,
{
    /// Create a new scanner worker. `scan_hour` must be in 0..=23.
    pub fn new(scanner: Arc<ExpirationScanner<S, P, B>>, scan_hour: u32) -> Self {
        Self { scanner, scan_hour }
    }

    /// Run the scan schedule until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(scan_hour = self.scan_hour, "Starting expiration scan scheduler");

        loop {
            let now = Local::now();
            let next = next_run_at(now, self.scan_hour);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(next_run = %next, "Waiting for next scheduled scan");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    match self.scanner.run_scan().await {
                        Ok(_) => {}
                        Err(ScanError::AlreadyRunning) => {
                            warn!("Previous scan still running, skipping this trigger");
                        }
                        Err(e) => {
                            error!(error = %e, "Expiration scan failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Scan scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }
}

/// The next strictly-future occurrence of `hour:00:00` local time.
///
/// Skips forward across DST gaps where the wall-clock time does not exist.
fn next_run_at(now: DateTime<Local>, hour: u32) -> DateTime<Local> {
    let mut date = now.date_naive();
    loop {
        if let Some(naive) = date.and_hms_opt(hour, 0, 0) {
            if let Some(candidate) = Local.from_local_datetime(&naive).earliest() {
                if candidate > now {
                    return candidate;
                }
            }
        }
        date = date.succ_opt().expect("calendar range not exhausted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_next_run_is_later_today_before_the_hour() {
        let now = Local.with_ymd_and_hms(2026, 3, 2, 7, 30, 0).unwrap();
        let next = next_run_at(now, 9);
        assert_eq!(next.hour(), 9);
        assert_eq!(next.date_naive(), now.date_naive());
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow_after_the_hour() {
        let now = Local.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let next = next_run_at(now, 9);
        assert!(next > now);
        assert_eq!(next.date_naive(), now.date_naive().succ_opt().unwrap());
    }

    #[test]
    fn test_next_run_is_always_in_the_future() {
        let now = Local::now();
        for hour in [0, 9, 23] {
            assert!(next_run_at(now, hour) > now);
        }
    }
}
