//! Gateway error types.

use thiserror::Error;

/// Why a translation call produced no words.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request could not be sent or the connection broke.
    #[error("Translation request failed: {0}")]
    Request(String),

    /// The service did not answer within the configured timeout.
    #[error("Translation request timed out")]
    Timeout,

    /// The service answered with a non-2xx status.
    #[error("Translation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body is not the expected array of word tuples.
    #[error("Malformed translation response: {0}")]
    MalformedResponse(String),

    /// The body is a valid but empty word list.
    #[error("Translation service returned no words")]
    Empty,

    /// The HTTP client could not be built.
    #[error("Invalid gateway configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Request(err.to_string())
        }
    }
}
