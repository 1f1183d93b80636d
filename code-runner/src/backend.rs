use async_trait::async_trait;
use std::{
    ffi::OsStr,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tokio::time::Duration;
use tracing::debug;

use crate::{
    error::Error,
    process::run_with_timeout,
    types::{BackendOutput, SourceDelivery},
};

/// The mechanism that actually runs code for a language.
///
/// Implementations own language selection and sandboxing. They should
/// enforce `timeout` themselves and leave no process behind when it expires;
/// the dispatcher drops a run that overstays it regardless.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Run `source` with the interpreter/compiler selected by `language`.
    async fn run(
        &self,
        language: &str,
        source: &str,
        timeout: Duration,
    ) -> Result<BackendOutput, Error>;

    /// Whether a `real <duration>` marker is appended to stderr.
    fn reports_timing(&self) -> bool {
        false
    }
}

/// Backend driven by an external execution script.
///
/// With [`SourceDelivery::TempFile`] the script is invoked as
/// `<script> <language> <path>` and is expected to time the program, e.g. with
/// bash's `time`. With [`SourceDelivery::Stdin`] it is invoked as
/// `<script> <language>` and reads the source from stdin.
#[derive(Debug, Clone)]
pub struct ScriptBackend {
    script: PathBuf,
    delivery: SourceDelivery,
    temp_dir: Option<PathBuf>,
}

impl ScriptBackend {
    pub fn new(script: impl Into<PathBuf>, delivery: SourceDelivery) -> Self {
        Self {
            script: script.into(),
            delivery,
            temp_dir: None,
        }
    }

    /// Directory for source files; the system temp dir when unset.
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn delivery(&self) -> SourceDelivery {
        self.delivery
    }

    /// Write the source to a uniquely named file that is removed on drop.
    fn write_source_file(&self, language: &str, source: &str) -> Result<NamedTempFile, Error> {
        let suffix = source_suffix(language);
        let mut builder = tempfile::Builder::new();
        builder.prefix("snippet-").suffix(&suffix);

        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| Error::System(format!("Failed to create source file: {}", e)))?;

        file.write_all(source.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| Error::System(format!("Failed to write source file: {}", e)))?;

        debug!("Wrote source to {}", file.path().display());
        Ok(file)
    }
}

#[async_trait]
impl ExecutionBackend for ScriptBackend {
    async fn run(
        &self,
        language: &str,
        source: &str,
        timeout: Duration,
    ) -> Result<BackendOutput, Error> {
        match self.delivery {
            SourceDelivery::TempFile => {
                // Kept alive until the script has exited; deleted on every path.
                let source_file = self.write_source_file(language, source)?;
                let args = [OsStr::new(language), source_file.path().as_os_str()];
                run_with_timeout(&self.script, &args, None, timeout).await
            }
            SourceDelivery::Stdin => {
                run_with_timeout(&self.script, &[language], Some(source), timeout).await
            }
        }
    }

    fn reports_timing(&self) -> bool {
        self.delivery == SourceDelivery::TempFile
    }
}

/// `.python` for a plain identifier, nothing otherwise, so the language can
/// never steer the file outside the temp directory.
fn source_suffix(language: &str) -> String {
    let plain = language
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_'));
    if plain && !language.is_empty() {
        format!(".{}", language)
    } else {
        String::new()
    }
}
