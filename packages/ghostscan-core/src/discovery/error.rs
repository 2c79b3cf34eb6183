use thiserror::Error;

/// Failure of one exchange with the discovery service.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or no response arrived (connect, timeout)
    #[error("discovery service unreachable: {0}")]
    Request(#[source] reqwest::Error),

    /// The service answered with a non-success status
    #[error("discovery service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    /// The response body was not the expected JSON
    #[error("failed to decode discovery response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl TransportError {
    /// Whether the service was reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, TransportError::Request(_))
    }
}
