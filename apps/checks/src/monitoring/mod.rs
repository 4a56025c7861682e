/// Monitoring engine module - everything that happens to a single check
///
/// This module is responsible for:
/// - Sanitizing persisted check documents
/// - Executing HTTP/HTTPS probes
/// - Classifying outcomes and deciding on alerts
/// - Driving the periodic scan and rotation timers
pub mod checker;
pub mod classifier;
pub mod executor;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use checker::{HttpProber, Prober};
pub use executor::MonitoringExecutor;
pub use types::{Check, CheckState, Method, ProbeOutcome, Protocol};
pub use validation::{ValidationError, validate_check};
