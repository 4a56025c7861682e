use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Periodic timer driving one of the engine's background jobs
#[derive(Debug, Clone)]
pub struct MonitoringScheduler {
    name: &'static str,
    period: Duration,
}

impl MonitoringScheduler {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self { name, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run `job` now and then once per period, forever.
    ///
    /// A run is awaited before the next tick is taken, so runs never overlap;
    /// a run longer than the period delays the following one. A run that
    /// panics is logged and the schedule continues.
    pub fn spawn<F, Fut>(&self, mut job: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = self.name;
        let period = self.period;

        tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(job = name, period_secs = period.as_secs_f64(), "Background job scheduled");

            loop {
                timer.tick().await;
                tracing::debug!(job = name, "Background job tick");
                if let Err(e) = tokio::spawn(job()).await {
                    tracing::error!(job = name, error = %e, "Background job aborted, keeping schedule");
                }
            }
        })
    }
}
