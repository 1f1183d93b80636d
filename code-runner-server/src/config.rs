use clap::Parser;
use code_runner::{CodeExecutionService, ScriptBackend, SourceDelivery};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    os::unix::fs::PermissionsExt,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tracing::warn;

use crate::ServerError;

pub const DEFAULT_PORT: u16 = 8080;

/// Everything the server needs, parsed once at startup.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Script that runs a snippet for a given language
    #[arg(long, env = "EXECUTE_SCRIPT", default_value = "/app/runner/execute.sh")]
    pub execute_script: PathBuf,

    /// How the source reaches the script: `file` (with timing) or `stdin`
    #[arg(long, env = "SOURCE_DELIVERY", default_value = "file")]
    pub delivery: SourceDelivery,

    /// Wall-clock limit per execution in seconds
    #[arg(long, env = "EXECUTION_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,

    /// Directory for source files, defaults to the system temp dir
    #[arg(long, env = "RUNNER_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Maximum number of concurrent executions, 0 for unlimited
    #[arg(long, env = "MAX_CONCURRENT_EXECUTIONS", default_value = "0")]
    pub max_concurrent: usize,

    /// Request body limit in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "1048576")]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.timeout_secs == 0 {
            return Err(ServerError::Config(
                "execution timeout must be at least one second".to_string(),
            ));
        }
        if !self.execute_script.exists() {
            return Err(ServerError::Config(format!(
                "execute script not found: {}",
                self.execute_script.display()
            )));
        }
        // Spawn failures are still reported per request.
        match self.execute_script.metadata() {
            Ok(meta) if meta.permissions().mode() & 0o111 == 0 => {
                warn!("Execute script {} is not executable", self.execute_script.display())
            }
            _ => {}
        }
        if let Some(dir) = &self.temp_dir {
            if !dir.is_dir() {
                return Err(ServerError::Config(format!(
                    "temp dir is not a directory: {}",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Build the dispatcher backed by the configured execution script.
    pub fn build_service(&self) -> CodeExecutionService {
        let mut backend = ScriptBackend::new(&self.execute_script, self.delivery);
        if let Some(dir) = &self.temp_dir {
            backend = backend.with_temp_dir(dir);
        }
        CodeExecutionService::new(Arc::new(backend))
            .with_timeout(self.timeout())
            .with_max_concurrent(self.max_concurrent)
    }
}
