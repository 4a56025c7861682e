//! Uppe checks - periodic HTTP/HTTPS uptime checks with SMS alerts.
//!
//! The [`orchestrator::Orchestrator`] scans every check document in the
//! record store on a fixed interval, probes it, stores the new up/down state,
//! appends the outcome to the check's log and alerts the owner when the state
//! changes. A second, slower timer rotates the logs into compressed archives.

pub mod config;
pub mod logs;
pub mod monitoring;
pub mod notify;
pub mod orchestrator;
pub mod store;

pub use config::Config;
pub use orchestrator::Orchestrator;
