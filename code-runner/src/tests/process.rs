use assert_fs::TempDir;
use nix::{errno::Errno, sys::signal::kill, unistd::Pid};
use std::path::Path;
use tokio::time::{Duration, Instant};

use super::utils::{
    defaults::{default_timeout, short_timeout},
    processes::{read_pid, wait_until_dead},
    scripts::install_script,
};
use crate::{process::run_with_timeout, Error, Result};

const NO_ARGS: [&str; 0] = [];

#[tokio::test]
async fn test_captures_both_streams() -> Result<()> {
    let output = run_with_timeout(
        Path::new("/bin/sh"),
        &["-c", "echo out; echo err >&2"],
        None,
        default_timeout(),
    )
    .await?;
    assert_eq!(output.stdout, "out\n");
    assert_eq!(output.stderr, "err\n");
    assert_eq!(output.exit_code, Some(0));
    Ok(())
}

#[tokio::test]
async fn test_feeds_stdin() -> Result<()> {
    let output = run_with_timeout(
        Path::new("/bin/cat"),
        &NO_ARGS,
        Some("test input"),
        default_timeout(),
    )
    .await?;
    assert_eq!(output.stdout, "test input");
    assert!(output.stderr.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unread_stdin_is_not_an_error() -> Result<()> {
    let input = "x".repeat(1024 * 1024);
    let output = run_with_timeout(
        Path::new("/bin/sh"),
        &["-c", "exit 0"],
        Some(&input),
        default_timeout(),
    )
    .await?;
    assert_eq!(output.exit_code, Some(0));
    Ok(())
}

#[tokio::test]
async fn test_nonzero_exit_code_is_reported() -> Result<()> {
    let output = run_with_timeout(
        Path::new("/bin/sh"),
        &["-c", "echo bad >&2; exit 4"],
        None,
        default_timeout(),
    )
    .await?;
    assert_eq!(output.exit_code, Some(4));
    assert_eq!(output.stderr, "bad\n");
    Ok(())
}

#[tokio::test]
async fn test_missing_program_is_spawn_failure() {
    let result = run_with_timeout(
        Path::new("/nonexistent/execute.sh"),
        &["python"],
        None,
        default_timeout(),
    )
    .await;
    assert!(matches!(result, Err(Error::SpawnFailure(ref m)) if m.contains("/nonexistent/execute.sh")));
}

#[tokio::test]
async fn test_non_executable_program_is_spawn_failure() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("execute.sh");
    std::fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();

    let result = run_with_timeout(&script, &NO_ARGS, None, default_timeout()).await;
    assert!(matches!(result, Err(Error::SpawnFailure(_))));
}

#[tokio::test]
async fn test_timeout_kills_and_reaps_child() {
    let dir = TempDir::new().unwrap();
    let pid_file = dir.path().join("pid");
    let script = install_script(
        &dir,
        "runner.sh",
        &format!("#!/bin/sh\necho $$ > {}\necho partial\nsleep 30\n", pid_file.display()),
    );

    let started = Instant::now();
    let result = run_with_timeout(&script, &NO_ARGS, None, short_timeout()).await;
    assert!(matches!(result, Err(Error::Timeout(t)) if t == short_timeout()));
    assert!(started.elapsed() < Duration::from_secs(10));

    let pid = read_pid(&pid_file);
    assert_eq!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH));
}

#[tokio::test]
async fn test_busy_loop_times_out() {
    let result = run_with_timeout(
        Path::new("/bin/sh"),
        &["-c", "while :; do :; done"],
        None,
        short_timeout(),
    )
    .await;
    assert!(matches!(result, Err(Error::Timeout(_))));
}

#[tokio::test]
async fn test_background_process_holding_pipes_times_out() {
    // The script exits at once but leaves a descendant attached to stdout.
    let started = Instant::now();
    let result = run_with_timeout(
        Path::new("/bin/sh"),
        &["-c", "sleep 30 & echo started"],
        None,
        short_timeout(),
    )
    .await;
    assert!(matches!(result, Err(Error::Timeout(_))));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_detached_descendant_is_killed_after_completion() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let pid_file = dir.path().join("pid");
    let command = format!(
        "sleep 30 >/dev/null 2>&1 </dev/null & echo $! > {}; echo done",
        pid_file.display()
    );

    let output = run_with_timeout(
        Path::new("/bin/sh"),
        &["-c", command.as_str()],
        None,
        default_timeout(),
    )
    .await?;
    assert_eq!(output.stdout, "done\n");

    let pid = read_pid(&pid_file);
    assert!(wait_until_dead(pid, Duration::from_secs(5)).await);
    Ok(())
}
