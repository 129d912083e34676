/// Failure talking to an external collaborator.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{endpoint} timed out after {timeout_ms} ms")]
    Timeout {
        endpoint: &'static str,
        timeout_ms: u64,
    },
    #[error("{endpoint} transport failure: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} responded with HTTP {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("{endpoint} returned an unreadable payload: {detail}")]
    Decode {
        endpoint: &'static str,
        detail: String,
    },
    #[error("{endpoint} rejected the request: {reason}")]
    Rejected {
        endpoint: &'static str,
        reason: String,
    },
    #[error("invalid collaborator request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// Timeouts, transport failures and 5xx/429 responses may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Timeout { .. } | GatewayError::Transport { .. } => true,
            GatewayError::Status { status, .. } => *status >= 500 || *status == 429,
            GatewayError::Decode { .. }
            | GatewayError::Rejected { .. }
            | GatewayError::InvalidRequest(_) => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout { .. })
    }
}
