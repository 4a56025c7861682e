use serde::{Deserialize, Serialize};

/// Length of a check identifier
pub const CHECK_ID_LEN: usize = 20;

/// Length of the owner's phone number
pub const PHONE_LEN: usize = 10;

/// Accepted range for `timeoutSeconds`
pub const MIN_TIMEOUT_SECONDS: u64 = 1;
pub const MAX_TIMEOUT_SECONDS: u64 = 5;

/// Protocol used to reach a check's target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method used by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Binary state of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    #[default]
    Down,
}

impl CheckState {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckState::Up => "up",
            CheckState::Down => "down",
        }
    }
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated check, as produced by [`super::validation::validate_check`].
///
/// Field names on the wire follow the persisted document layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,
    #[serde(rename = "userPhone")]
    pub owner_phone: String,
    pub protocol: Protocol,
    pub url: String,
    pub method: Method,
    pub success_codes: Vec<u16>,
    pub timeout_seconds: u64,
    pub state: CheckState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<i64>,
}

impl Check {
    /// State recorded by a previous probe, `None` if the check was never probed.
    ///
    /// A never-probed check still carries the default `down` state, this keeps
    /// the two apart.
    pub fn observed_state(&self) -> Option<CheckState> {
        self.last_checked.map(|_| self.state)
    }

    /// Full target address, `protocol://url`
    pub fn target(&self) -> String {
        format!("{}://{}", self.protocol, self.url)
    }

    /// Copy of this check with the fields a probe cycle rewrites
    pub fn with_observation(&self, state: CheckState, checked_at: i64) -> Self {
        Self { state, last_checked: Some(checked_at), ..self.clone() }
    }
}

/// Outcome of a single probe
///
/// Exactly one of `error_occurred` or a numeric `response_code` is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    pub error_occurred: bool,
    pub error_detail: Option<String>,
    pub response_code: Option<u16>,
}

impl ProbeOutcome {
    /// Detail recorded when the probe did not finish in time
    pub const TIMEOUT: &'static str = "timeout";

    /// A response was received
    pub fn responded(status_code: u16) -> Self {
        Self { error_occurred: false, error_detail: None, response_code: Some(status_code) }
    }

    /// A transport-level error occurred
    pub fn failed(detail: impl Into<String>) -> Self {
        Self { error_occurred: true, error_detail: Some(detail.into()), response_code: None }
    }

    /// The check's timeout elapsed first
    pub fn timed_out() -> Self {
        Self::failed(Self::TIMEOUT)
    }

    pub fn is_timeout(&self) -> bool {
        self.error_occurred && self.error_detail.as_deref() == Some(Self::TIMEOUT)
    }
}
