use serde::{Serialize, Serializer};
use std::fmt;

/// Marker reported in place of a duration when the backend emitted none.
pub const ELAPSED_UNAVAILABLE: &str = "N/A";

/// Validated code execution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Backend selector, forwarded untouched
    pub language: String,
    /// Decoded source text
    pub code: String,
}

/// Wall-clock time as reported by a timing-aware backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Elapsed {
    /// Duration text exactly as it appeared in the timing marker, e.g. `0m0.013s`
    Measured(String),
    /// The backend reports timing but no marker was found
    Unavailable,
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Elapsed::Measured(duration) => f.write_str(duration),
            Elapsed::Unavailable => f.write_str(ELAPSED_UNAVAILABLE),
        }
    }
}

impl Serialize for Elapsed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Execution result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    /// Program output (stdout), verbatim
    pub stdout: String,
    /// Program errors (stderr), timing marker removed and trimmed
    pub stderr: String,
    /// `None` when the backend does not report timing at all
    #[serde(rename = "time", skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<Elapsed>,
}

/// Raw streams captured from one backend invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code of the backend process; `None` if it was ended by a signal
    pub exit_code: Option<i32>,
}

/// How source code reaches the execution script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceDelivery {
    /// `<script> <language> <tmpfile>`, timing marker expected on stderr
    TempFile,
    /// `<script> <language>` with the source on stdin, no timing
    Stdin,
}

impl std::str::FromStr for SourceDelivery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" | "tempfile" => Ok(SourceDelivery::TempFile),
            "stdin" => Ok(SourceDelivery::Stdin),
            _ => Err(format!("Unsupported source delivery: {}", s)),
        }
    }
}

impl fmt::Display for SourceDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceDelivery::TempFile => f.write_str("file"),
            SourceDelivery::Stdin => f.write_str("stdin"),
        }
    }
}
