use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{LogError, LogStore};
use crate::monitoring::types::{Check, CheckState, ProbeOutcome};

/// One line of a check's log: what was probed, what came back, what we decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Check as it was before this probe
    pub check: Check,
    pub outcome: ProbeOutcome,
    pub state: CheckState,
    pub alert: bool,
    /// Epoch millis
    pub time: i64,
}

/// Appends one record per completed probe to the log named after the check
#[derive(Clone)]
pub struct OutcomeLogger {
    logs: Arc<LogStore>,
}

impl OutcomeLogger {
    pub fn new(logs: Arc<LogStore>) -> Self {
        Self { logs }
    }

    pub async fn log(&self, record: &LogRecord) -> Result<(), LogError> {
        let line = serde_json::to_string(record).map_err(std::io::Error::from)?;
        self.logs.append(&record.check.id, &line).await
    }
}
