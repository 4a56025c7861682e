/// Orchestrator module - the check-monitoring engine
///
/// The orchestrator owns one instance of every collaborator and drives them:
/// - The scan cycle: list → read → validate → probe → classify → log →
///   persist → alert, per check
/// - The rotation pass over probe logs
/// - The two timers that repeat them for the lifetime of the process
pub mod rotation;


pub use rotation::{LogRotator, RotationReport};

use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{Config, EngineConfig};
use crate::logs::{LogRecord, LogStore, OutcomeLogger};
use crate::monitoring::classifier::evaluate;
use crate::monitoring::scheduler::MonitoringScheduler;
use crate::monitoring::types::CheckState;
use crate::monitoring::{HttpProber, MonitoringExecutor, Prober, ValidationError, validate_check};
use crate::notify::{AlertDispatcher, LogTransport, NotificationTransport, TwilioSms};
use crate::store::{CHECKS, FileStore, RecordStore, StoreError};

/// Why a check was skipped for this cycle
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Failed to read check {id}: {source}")]
    Read { id: String, source: StoreError },

    #[error("Check {id} is malformed: {source}")]
    Malformed { id: String, source: ValidationError },

    #[error("Failed to persist check {id}: {source}")]
    Persist { id: String, source: StoreError },
}

/// What one check went through in a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub id: String,
    pub state: CheckState,
    pub alert: bool,
    /// Whether the transport accepted the alert
    pub alert_sent: bool,
}

/// Counts from one scan cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub listed: usize,
    pub updated: usize,
    pub malformed: usize,
    pub failed: usize,
    pub alerts: usize,
}

/// The check-monitoring engine, one per process
pub struct Orchestrator {
    config: EngineConfig,
    store: Arc<dyn RecordStore>,
    executor: MonitoringExecutor,
    dispatcher: AlertDispatcher,
    outcome_logger: OutcomeLogger,
    rotator: LogRotator,
}

impl Orchestrator {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn RecordStore>,
        prober: Arc<dyn Prober>,
        transport: Arc<dyn NotificationTransport>,
        logs: Arc<LogStore>,
    ) -> Self {
        Self {
            config,
            store,
            executor: MonitoringExecutor::new(prober),
            dispatcher: AlertDispatcher::new(transport),
            outcome_logger: OutcomeLogger::new(Arc::clone(&logs)),
            rotator: LogRotator::new(logs),
        }
    }

    /// Wire the engine to the file store, the HTTP prober and the configured
    /// alert transport
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(FileStore::new(&config.storage.data_dir));
        let prober = Arc::new(HttpProber::new(&config.engine.user_agent)?);
        let logs = Arc::new(LogStore::new(&config.storage.logs_dir));

        let transport: Arc<dyn NotificationTransport> = match &config.sms {
            Some(sms) => Arc::new(TwilioSms::new(sms.clone())),
            None => {
                warn!("No SMS gateway configured, alerts will only be logged");
                Arc::new(LogTransport)
            }
        };

        Ok(Self::new(config.engine.clone(), store, prober, transport, logs))
    }

    /// One pass over every known check.
    ///
    /// Checks are processed concurrently up to `max_concurrent_probes`; a
    /// failing check is logged and skipped without affecting the others.
    pub async fn scan_once(&self) -> ScanReport {
        let mut report = ScanReport::default();

        let ids = match self.store.list(CHECKS).await {
            Ok(ids) if ids.is_empty() => {
                debug!("Could not find any checks to process");
                return report;
            }
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Could not list checks, retrying next cycle");
                return report;
            }
        };
        report.listed = ids.len();

        let results: Vec<Result<CheckReport, CheckError>> = futures::stream::iter(ids)
            .map(|id| async move { self.process_check(&id).await })
            .buffer_unordered(self.config.max_concurrent_probes.max(1))
            .collect()
            .await;

        for result in results {
            match result {
                Ok(check) => {
                    report.updated += 1;
                    if check.alert_sent {
                        report.alerts += 1;
                    }
                }
                Err(e @ CheckError::Malformed { .. }) => {
                    warn!(error = %e, "Skipping improperly formatted check");
                    report.malformed += 1;
                }
                Err(e) => {
                    error!(error = %e, "Check skipped for this cycle");
                    report.failed += 1;
                }
            }
        }

        info!(
            listed = report.listed,
            updated = report.updated,
            malformed = report.malformed,
            failed = report.failed,
            alerts = report.alerts,
            "Scan cycle completed"
        );
        report
    }

    /// Run one check through the whole pipeline.
    ///
    /// The probe record is logged even when the state cannot be persisted; the
    /// alert is only sent once the new state is stored. A document whose `id`
    /// differs from its record id is malformed.
    pub async fn process_check(&self, id: &str) -> Result<CheckReport, CheckError> {
        let document = self
            .store
            .read(CHECKS, id)
            .await
            .map_err(|source| CheckError::Read { id: id.to_string(), source })?;

        let check = validate_check(&document)
            .map_err(|source| CheckError::Malformed { id: id.to_string(), source })?;
        if check.id != id {
            // Logs and alerts follow the document id, writes follow the record id.
            return Err(CheckError::Malformed {
                id: id.to_string(),
                source: ValidationError { id: Some(check.id), fields: vec!["id"] },
            });
        }

        let outcome = self.executor.execute_check(&check).await;
        let verdict = evaluate(&check, &outcome);
        let checked_at = chrono::Utc::now().timestamp_millis();
        debug!(
            check_id = %check.id,
            state = %verdict.state,
            alert = verdict.alert,
            response_code = ?outcome.response_code,
            error = ?outcome.error_detail,
            "Probe completed"
        );

        let record = LogRecord {
            check: check.clone(),
            outcome,
            state: verdict.state,
            alert: verdict.alert,
            time: checked_at,
        };
        if let Err(e) = self.outcome_logger.log(&record).await {
            warn!(check_id = %check.id, error = %e, "Logging to file failed");
        }

        // Merged into the document as stored now, so edits made while the
        // probe ran are kept.
        let mut observation = Map::new();
        observation.insert("state".into(), Value::from(verdict.state.as_str()));
        observation.insert("lastChecked".into(), Value::from(checked_at));
        self.store
            .merge(CHECKS, id, &observation)
            .await
            .map_err(|source| CheckError::Persist { id: id.to_string(), source })?;

        let updated = check.with_observation(verdict.state, checked_at);
        let alert_sent = if verdict.alert {
            self.dispatcher.dispatch(&updated).await
        } else {
            debug!(check_id = %check.id, "Check outcome has not changed, no alert needed");
            false
        };

        Ok(CheckReport { id: check.id, state: verdict.state, alert: verdict.alert, alert_sent })
    }

    /// One rotation pass over the probe logs
    pub async fn rotate_once(&self) -> RotationReport {
        self.rotator.rotate_all().await
    }

    /// Spawn the scan and rotation timers. Both run until aborted.
    pub fn start(self: &Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let scan_scheduler = MonitoringScheduler::new("scan", self.config.scan_interval());
        let rotation_scheduler =
            MonitoringScheduler::new("log-rotation", self.config.rotation_interval());

        let engine = Arc::clone(self);
        let scan = scan_scheduler.spawn(move || {
            let engine = Arc::clone(&engine);
            async move {
                engine.scan_once().await;
            }
        });

        let engine = Arc::clone(self);
        let rotation = rotation_scheduler.spawn(move || {
            let engine = Arc::clone(&engine);
            async move {
                engine.rotate_once().await;
            }
        });

        (scan, rotation)
    }

    /// Run the background workers until Ctrl-C
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!("Background workers are running");
        let (scan, rotation) = self.start();

        tokio::signal::ctrl_c().await?;
        info!("Shutting down background workers");
        scan.abort();
        rotation.abort();
        Ok(())
    }
}
