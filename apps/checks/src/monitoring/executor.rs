use std::sync::Arc;

use super::checker::Prober;
use super::types::{Check, ProbeOutcome};

/// Monitoring executor - runs probes behind a task boundary
///
/// A panic inside a prober only fails that probe; it surfaces as an errored
/// outcome and the check is classified `down`.
#[derive(Clone)]
pub struct MonitoringExecutor {
    prober: Arc<dyn Prober>,
}

impl MonitoringExecutor {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self { prober }
    }

    /// Execute one probe for a check
    pub async fn execute_check(&self, check: &Check) -> ProbeOutcome {
        let prober = Arc::clone(&self.prober);
        let check = check.clone();

        match tokio::spawn(async move { prober.probe(&check).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Probe task aborted");
                ProbeOutcome::failed(format!("probe aborted: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{CheckState, Method, Protocol};

    struct FixedProber(ProbeOutcome);

    #[async_trait::async_trait]
    impl Prober for FixedProber {
        async fn probe(&self, _check: &Check) -> ProbeOutcome {
            self.0.clone()
        }
    }

    struct PanickingProber;

    #[async_trait::async_trait]
    impl Prober for PanickingProber {
        async fn probe(&self, check: &Check) -> ProbeOutcome {
            panic!("prober blew up on {}", check.id);
        }
    }

    fn check() -> Check {
        Check {
            id: "abcdefghij0123456789".to_string(),
            owner_phone: "5551234567".to_string(),
            protocol: Protocol::Https,
            url: "example.test".to_string(),
            method: Method::Get,
            success_codes: vec![200],
            timeout_seconds: 1,
            state: CheckState::Down,
            last_checked: None,
        }
    }

    #[tokio::test]
    async fn test_outcome_is_passed_through() {
        let executor = MonitoringExecutor::new(Arc::new(FixedProber(ProbeOutcome::responded(204))));
        assert_eq!(executor.execute_check(&check()).await, ProbeOutcome::responded(204));
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_outcome() {
        let executor = MonitoringExecutor::new(Arc::new(PanickingProber));
        let outcome = executor.execute_check(&check()).await;

        assert!(outcome.error_occurred);
        assert!(outcome.error_detail.unwrap().starts_with("probe aborted"));
    }
}
