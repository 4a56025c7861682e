use std::error::Error as _;
use std::time::Duration;

use anyhow::Result;
use tokio::time::timeout;
use url::Url;

use super::types::{Check, ProbeOutcome};

/// Performs one outbound request for a check
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Probe the check once and reduce whatever happened to an outcome.
    ///
    /// Implementations never fail: transport errors and timeouts are outcomes.
    async fn probe(&self, check: &Check) -> ProbeOutcome;
}

/// HTTP/HTTPS prober
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(user_agent: &str) -> Result<Self> {
        // The first status line is the outcome, redirects are not followed.
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, check: &Check) -> ProbeOutcome {
        let target = match Url::parse(&check.target()) {
            Ok(target) => target,
            Err(e) => return ProbeOutcome::failed(format!("invalid target url: {e}")),
        };

        let request = self.client.request(check.method.into(), target).send();

        // Whichever of response, error or timeout comes first decides the
        // outcome; the request future is dropped with the losers.
        match timeout(Duration::from_secs(check.timeout_seconds), request).await {
            Err(_) => ProbeOutcome::timed_out(),
            Ok(Ok(response)) => ProbeOutcome::responded(response.status().as_u16()),
            Ok(Err(e)) if e.is_timeout() => ProbeOutcome::timed_out(),
            Ok(Err(e)) => ProbeOutcome::failed(describe_error(&e)),
        }
    }
}

/// Flatten a reqwest error and its causes into one line
fn describe_error(error: &reqwest::Error) -> String {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}
