//! Timeout-bounded child process execution.

use nix::{
    errno::Errno,
    sys::signal::{killpg, Signal},
    unistd::Pid,
};
use std::{
    ffi::OsStr,
    fmt,
    io::ErrorKind,
    path::Path,
    process::Stdio,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStdin, Command},
    time::{self, Duration},
};
use tracing::{debug, warn};

use crate::{error::Error, types::BackendOutput};

/// Lifecycle of one backend invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Spawning,
    Running,
    Completed,
    TimedOut,
    SpawnFailed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Spawning => "spawning",
            Phase::Running => "running",
            Phase::Completed => "completed",
            Phase::TimedOut => "timed_out",
            Phase::SpawnFailed => "spawn_failed",
        };
        f.write_str(name)
    }
}

/// Kills the child's whole process group unless disarmed.
///
/// The child leads its own group, so scripts that fork interpreters or
/// compilers are taken down together with it when the execution is abandoned.
struct ProcessGroupGuard {
    pgid: Option<Pid>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|id| i32::try_from(id).ok()).map(Pid::from_raw),
        }
    }

    fn kill(&self) {
        if let Some(pgid) = self.pgid {
            match killpg(pgid, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => warn!("Failed to kill process group {}: {}", pgid, e),
            }
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Run `program args..` with piped stdout/stderr, optionally feeding `input`
/// on stdin, and wait at most `timeout` for it to exit and close its pipes.
///
/// Whatever is left in the process group is killed once the child exits. On
/// timeout the group is killed and the child reaped before returning
/// [`Error::Timeout`]; no partial output is returned.
pub async fn run_with_timeout<S: AsRef<OsStr>>(
    program: &Path,
    args: &[S],
    input: Option<&str>,
    timeout: Duration,
) -> Result<BackendOutput, Error> {
    debug!(phase = %Phase::Spawning, program = %program.display(), "Launching backend");

    let mut command = Command::new(program);
    command
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .process_group(0)
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| {
        debug!(phase = %Phase::SpawnFailed, error = %e, "Backend could not be launched");
        Error::SpawnFailure(format!("{}: {}", program.display(), e))
    })?;
    // Declared after `child` so the group is killed before the child is dropped.
    let mut guard = ProcessGroupGuard::new(child.id());

    debug!(phase = %Phase::Running, pid = ?child.id(), "Backend running");

    let stdin = child.stdin.take();
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::System("Child stdout was not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::System("Child stderr was not captured".to_string()))?;

    let collected = time::timeout(timeout, async {
        tokio::try_join!(
            child.wait(),
            feed_stdin(stdin, input),
            read_stream(stdout),
            read_stream(stderr),
        )
    })
    .await;

    match collected {
        Ok(Ok((status, (), stdout, stderr))) => {
            // Descendants that let go of the pipes must not outlive the request.
            guard.kill();
            guard.disarm();
            debug!(phase = %Phase::Completed, status = %status, "Backend finished");
            Ok(BackendOutput {
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
                exit_code: status.code(),
            })
        }
        Ok(Err(e)) => {
            reap(&mut child, &mut guard).await;
            Err(Error::Io(e))
        }
        Err(_) => {
            reap(&mut child, &mut guard).await;
            debug!(phase = %Phase::TimedOut, "Backend killed after timeout");
            Err(Error::Timeout(timeout))
        }
    }
}

async fn feed_stdin(stdin: Option<ChildStdin>, input: Option<&str>) -> std::io::Result<()> {
    let (Some(mut stdin), Some(input)) = (stdin, input) else {
        return Ok(());
    };
    // The program may exit without reading its input.
    match stdin.write_all(input.as_bytes()).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
        Err(e) => return Err(e),
    }
    match stdin.shutdown().await {
        Err(e) if e.kind() != ErrorKind::BrokenPipe => Err(e),
        _ => Ok(()),
    }
}

async fn read_stream<R: AsyncRead + Unpin>(mut stream: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Kill everything in the group and wait for the child so no zombie is left.
async fn reap(child: &mut Child, guard: &mut ProcessGroupGuard) {
    guard.kill();
    if let Err(e) = child.start_kill() {
        debug!("start_kill after group kill: {}", e);
    }
    if let Err(e) = child.wait().await {
        warn!("Failed to reap backend process: {}", e);
    }
    // The group id may be recycled once the leader is reaped.
    guard.disarm();
}
