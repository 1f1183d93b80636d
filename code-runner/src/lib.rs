//! # Code Runner
//!
//! Runs submitted code snippets through an external execution backend.
//! Requests are decoded and validated before anything is spawned, each
//! execution is bounded by a wall-clock timeout, and timing diagnostics
//! emitted by the backend are separated from the program's own stderr.

mod backend;
pub mod decoder;
mod error;
pub mod process;
mod service;
pub mod timing;
mod types;

#[cfg(test)]
mod tests;

pub use backend::{ExecutionBackend, ScriptBackend};
pub use decoder::{decode_request, encode_source};
pub use error::{Error, ValidationError};
pub use service::{CodeExecutionService, DEFAULT_TIMEOUT, TIMEOUT_GRACE};
pub use types::{
    BackendOutput, Elapsed, ExecutionRequest, ExecutionResult, SourceDelivery,
    ELAPSED_UNAVAILABLE,
};

/// Result type for code execution operations
pub type Result<T> = std::result::Result<T, Error>;
