use thiserror::Error;

/// Why an agent-service call failed. Callers branch on this, never on the
/// rendered error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad base URL or request construction
    Configuration,
    /// Network failure, timeout, or a non-success HTTP status
    Transport,
    /// The service reported that the addressed session does not exist
    SessionNotFound,
    /// The response body was not the JSON we expected
    Decode,
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid agent service URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("session not found (status {status}): {body}")]
    SessionNotFound { status: u16, body: String },

    #[error("failed to decode response: {source}")]
    Decode {
        #[from]
        source: serde_json::Error,
    },

    #[error("failed to create session: {source} (original error: {original})")]
    SessionRepair {
        #[source]
        source: Box<AgentError>,
        original: Box<AgentError>,
    },
}

impl AgentError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AgentError::InvalidUrl { .. } => FailureKind::Configuration,
            AgentError::Request { .. } | AgentError::Status { .. } => FailureKind::Transport,
            AgentError::SessionNotFound { .. } => FailureKind::SessionNotFound,
            AgentError::Decode { .. } => FailureKind::Decode,
            AgentError::SessionRepair { source, .. } => source.kind(),
        }
    }

    pub fn is_session_not_found(&self) -> bool {
        self.kind() == FailureKind::SessionNotFound
    }

    /// HTTP status reported by the service, if the failure came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            AgentError::Status { status, .. } | AgentError::SessionNotFound { status, .. } => {
                Some(*status)
            }
            AgentError::Request { source, .. } => source.status().map(|s| s.as_u16()),
            AgentError::SessionRepair { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Turn a non-success response into an error, deciding once whether it
    /// means "session not found".
    ///
    /// The service has no machine-readable error code, so this looks at the
    /// `error` / `message` / `detail` field of a JSON error payload, or at the
    /// raw body when it is not JSON.
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        if reports_missing_session(&body) {
            AgentError::SessionNotFound { status, body }
        } else {
            AgentError::Status { status, body }
        }
    }
}

fn reports_missing_session(body: &str) -> bool {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "message", "detail"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_owned))
        })
        .unwrap_or_else(|| body.to_owned())
        .to_lowercase();

    message.contains("session") && message.contains("not found")
}
