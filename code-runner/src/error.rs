use std::time::Duration;
use thiserror::Error;

/// Rejections raised while decoding a request body. Always the client's fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Missing language or code")]
    MissingField,

    #[error("Invalid code encoding: {0}")]
    Decoding(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to launch execution backend: {0}")]
    SpawnFailure(String),

    #[error("Execution timed out after {}", describe_limit(.0))]
    Timeout(Duration),

    #[error("System error: {0}")]
    System(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller, not the service, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

/// Whole seconds when the limit is a round number, milliseconds otherwise.
fn describe_limit(limit: &Duration) -> String {
    if limit.subsec_nanos() == 0 {
        format!("{} seconds", limit.as_secs())
    } else {
        format!("{} milliseconds", limit.as_millis())
    }
}
