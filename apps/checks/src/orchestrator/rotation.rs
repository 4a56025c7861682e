//! Periodic rotation of probe logs.
//!
//! Each live log is compressed into a dated archive and then emptied. One
//! log's failure is reported and the pass moves on to the next log.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::logs::{LogError, LogStore};

/// Counts from one rotation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationReport {
    pub rotated: usize,
    /// Live logs with nothing to archive
    pub empty: usize,
    pub failed: usize,
}

/// Rotates every live log in a [`LogStore`]
#[derive(Clone)]
pub struct LogRotator {
    logs: Arc<LogStore>,
}

impl LogRotator {
    pub fn new(logs: Arc<LogStore>) -> Self {
        Self { logs }
    }

    /// Archive name for a log rotated at `now_millis`
    pub fn archive_id(log_id: &str, now_millis: i64) -> String {
        format!("{log_id}-{now_millis}")
    }

    /// Rotate one live log
    pub async fn rotate_log(&self, log_id: &str, now_millis: i64) -> Result<(), LogError> {
        self.logs.rotate(log_id, &Self::archive_id(log_id, now_millis)).await
    }

    /// Rotate all live logs
    pub async fn rotate_all(&self) -> RotationReport {
        let mut report = RotationReport::default();

        let log_ids = match self.logs.list(false).await {
            Ok(ids) if ids.is_empty() => {
                debug!("No logs to rotate");
                return report;
            }
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Could not list logs to rotate");
                return report;
            }
        };

        for log_id in log_ids {
            let now = chrono::Utc::now().timestamp_millis();
            match self.rotate_log(&log_id, now).await {
                Ok(()) => {
                    debug!(log_id = %log_id, "Log rotated");
                    report.rotated += 1;
                }
                Err(LogError::Empty(_)) => report.empty += 1,
                Err(e) => {
                    warn!(log_id = %log_id, error = %e, "Log rotation failed, live log left untouched");
                    report.failed += 1;
                }
            }
        }

        info!(
            rotated = report.rotated,
            empty = report.empty,
            failed = report.failed,
            "Log rotation completed"
        );
        report
    }
}
