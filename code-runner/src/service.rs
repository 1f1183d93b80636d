use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::{sync::Semaphore, time};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    backend::ExecutionBackend,
    error::Error,
    timing::split_timing,
    types::{ExecutionRequest, ExecutionResult},
};

/// Wall-clock bound on a single execution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack for a backend to report its own timeout before the dispatcher
/// abandons the run.
pub const TIMEOUT_GRACE: Duration = Duration::from_millis(500);

/// Dispatches validated requests to the execution backend.
///
/// Holds no per-request state: every call spawns its own child process and
/// owns its own output. The optional semaphore only caps how many children
/// run at once. The timeout is enforced here as well as in the backend: a
/// run still pending after `timeout + TIMEOUT_GRACE` is dropped, which kills
/// whatever it spawned.
#[derive(Clone)]
pub struct CodeExecutionService {
    backend: Arc<dyn ExecutionBackend>,
    timeout: Duration,
    semaphore: Option<Arc<Semaphore>>,
}

impl CodeExecutionService {
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_TIMEOUT,
            semaphore: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap concurrent executions; `0` means unlimited.
    pub fn with_max_concurrent(mut self, max_concurrent_executions: usize) -> Self {
        self.semaphore = match max_concurrent_executions {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Free execution slots, or `None` when unlimited.
    pub fn available_slots(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    #[instrument(skip_all, fields(language = %request.language, source_bytes = request.code.len()))]
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, Error> {
        let _permit = match &self.semaphore {
            Some(semaphore) => Some(semaphore.acquire().await.map_err(|e| {
                Error::System(format!("Failed to acquire execution permit: {}", e))
            })?),
            None => None,
        };

        debug!("Starting code execution");
        let started = Instant::now();

        let run = self
            .backend
            .run(&request.language, &request.code, self.timeout);
        let output = match time::timeout(self.timeout + TIMEOUT_GRACE, run).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Backend ignored the execution timeout, abandoning run");
                Err(Error::Timeout(self.timeout))
            }
        }
        .inspect_err(|e| error!("Code execution failed: {}", e))?;

        let (stderr, elapsed) = if self.backend.reports_timing() {
            let (stderr, elapsed) = split_timing(&output.stderr);
            (stderr, Some(elapsed))
        } else {
            (output.stderr.trim().to_string(), None)
        };

        info!(
            exit_code = ?output.exit_code,
            elapsed = %elapsed.as_ref().map(ToString::to_string).unwrap_or_default(),
            wall_ms = started.elapsed().as_millis() as u64,
            "Code execution completed"
        );

        Ok(ExecutionResult {
            stdout: output.stdout,
            stderr,
            elapsed,
        })
    }
}
