pub mod defaults {
    use tokio::time::Duration;

    pub fn default_timeout() -> Duration {
        Duration::from_secs(10)
    }

    pub fn short_timeout() -> Duration {
        Duration::from_secs(1)
    }
}

pub mod scripts {
    use assert_fs::{prelude::*, TempDir};
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    /// Write an executable script named `name` into `dir`.
    pub fn install_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let script = dir.child(name);
        script.write_str(body).unwrap();
        std::fs::set_permissions(script.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
        script.path().to_path_buf()
    }

    /// Number of entries left in a directory.
    pub fn entry_count(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }
}

pub mod processes {
    use nix::{errno::Errno, sys::signal::kill, unistd::Pid};
    use tokio::time::{sleep, Duration, Instant};

    /// Gone, or a zombie left for its new parent to reap.
    pub fn is_dead(pid: i32) -> bool {
        match kill(Pid::from_raw(pid), None) {
            Err(Errno::ESRCH) => true,
            _ => std::fs::read_to_string(format!("/proc/{}/stat", pid))
                .map(|stat| {
                    stat.rsplit_once(')')
                        .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z'))
                })
                .unwrap_or(true),
        }
    }

    pub async fn wait_until_dead(pid: i32, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if is_dead(pid) {
                return true;
            }
            sleep(Duration::from_millis(50)).await;
        }
        is_dead(pid)
    }

    pub fn read_pid(path: &std::path::Path) -> i32 {
        std::fs::read_to_string(path)
            .unwrap()
            .trim()
            .parse()
            .unwrap()
    }
}

pub mod backends {
    use async_trait::async_trait;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };
    use tokio::time::Duration;

    use crate::{BackendOutput, Error, ExecutionBackend};

    /// Returns canned output and records what it was asked to run.
    pub struct FakeBackend {
        pub output: BackendOutput,
        pub timing: bool,
        pub calls: AtomicUsize,
        pub last: Mutex<Option<(String, String, Duration)>>,
    }

    impl FakeBackend {
        pub fn new(stdout: &str, stderr: &str, timing: bool) -> Self {
            Self {
                output: BackendOutput {
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                    exit_code: Some(0),
                },
                timing,
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ExecutionBackend for FakeBackend {
        async fn run(
            &self,
            language: &str,
            source: &str,
            timeout: Duration,
        ) -> Result<BackendOutput, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() =
                Some((language.to_string(), source.to_string(), timeout));
            Ok(self.output.clone())
        }

        fn reports_timing(&self) -> bool {
            self.timing
        }
    }

    /// Always fails the way a missing script or an expired timer would.
    pub enum FailingBackend {
        Spawn,
        Timeout,
    }

    #[async_trait]
    impl ExecutionBackend for FailingBackend {
        async fn run(
            &self,
            _language: &str,
            _source: &str,
            timeout: Duration,
        ) -> Result<BackendOutput, Error> {
            match self {
                FailingBackend::Spawn => Err(Error::SpawnFailure(
                    "/app/runner/execute.sh: No such file or directory (os error 2)".to_string(),
                )),
                FailingBackend::Timeout => Err(Error::Timeout(timeout)),
            }
        }
    }

    /// Holds each execution open for a while and tracks peak concurrency.
    pub struct SlowBackend {
        pub delay: Duration,
        pub running: AtomicUsize,
        pub peak: AtomicUsize,
    }

    impl SlowBackend {
        pub fn new(delay: Duration) -> Self {
            Self {
                delay,
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ExecutionBackend for SlowBackend {
        async fn run(
            &self,
            _language: &str,
            source: &str,
            _timeout: Duration,
        ) -> Result<BackendOutput, Error> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(BackendOutput {
                stdout: source.to_string(),
                ..Default::default()
            })
        }
    }
}
