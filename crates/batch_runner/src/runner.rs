//! One fetch attempt in an isolated, killable unit of execution.

use crate::error::{BatchError, Result};
use crate::policy::AttemptOutcome;
use async_trait::async_trait;
use stats_fetcher::{parse_failure_line, FetchErrorKind};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const STDERR_DRAIN: Duration = Duration::from_secs(2);

#[async_trait]
pub trait AttemptRunner: Send {
    /// Runs one attempt for `index`, abandoning it once `timeout` passes.
    async fn run_attempt(&mut self, index: i64, timeout: Duration) -> Result<AttemptOutcome>;
}

/// Runs `<program> <args...> <index>` as a child process per attempt.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    args:    Vec<String>,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args: Vec::new() }
    }

    /// Arguments placed before the identifier.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

#[async_trait]
impl AttemptRunner for ProcessRunner {
    async fn run_attempt(&mut self, index: i64, timeout: Duration) -> Result<AttemptOutcome> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(index.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so the browser the child launches dies with it.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|source| BatchError::Spawn { program: self.program.clone(), source })?;
        let group = child.id();
        let stderr = child.stderr.take().map(|stderr| tokio::spawn(forward_stderr(index, stderr)));

        let waited = tokio::time::timeout(timeout, child.wait()).await;
        let status = match waited {
            Ok(status) => {
                kill_group(group);
                status?
            }
            Err(_) => {
                kill_group(group);
                let _ = child.kill().await;
                drain(stderr).await;
                return Ok(AttemptOutcome::TimedOut);
            }
        };

        let kind = drain(stderr).await;
        if status.success() {
            return Ok(AttemptOutcome::Success);
        }
        debug!("[{}] child exited with {:?}, reported kind {:?}", index, status.code(), kind);
        Ok(AttemptOutcome::Failed { exit_code: status.code(), kind })
    }
}

/// Forwards child stderr as it arrives and remembers the last failure line.
async fn forward_stderr(index: i64, stderr: ChildStderr) -> Option<FetchErrorKind> {
    let mut lines = BufReader::new(stderr).lines();
    let mut kind = None;
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_failure_line(&line) {
            Some(k) => kind = Some(k),
            None if line.trim().is_empty() => {}
            None => warn!("[{}] {}", index, line),
        }
    }
    kind
}

async fn drain(reader: Option<JoinHandle<Option<FetchErrorKind>>>) -> Option<FetchErrorKind> {
    let reader = reader?;
    // A process outside the group may still hold the pipe open.
    match tokio::time::timeout(STDERR_DRAIN, reader).await {
        Ok(Ok(kind)) => kind,
        _ => None,
    }
}

#[cfg(unix)]
fn kill_group(group: Option<u32>) {
    let Some(pgid) = group.and_then(|id| libc::pid_t::try_from(id).ok()) else {
        return;
    };
    // SAFETY: killpg takes plain integers; ESRCH just means the group is already gone.
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_group: Option<u32>) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ProcessRunner {
        ProcessRunner::new("sh").with_args(["-c", script, "sh"])
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let outcome = sh("exit 0").run_attempt(0, Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Success);
    }

    #[tokio::test]
    async fn identifier_is_the_last_argument() {
        let outcome = sh(r#"[ "$1" = "-1" ]"#).run_attempt(-1, Duration::from_secs(5)).await.unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn failure_line_is_picked_up_from_stderr() {
        let mut runner = sh("echo 'Traceback-ish noise' >&2; echo 'FETCH_FAILED kind=unknown_category index=4' >&2; exit 1");
        let outcome = runner.run_attempt(4, Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            outcome,
            AttemptOutcome::Failed { exit_code: Some(1), kind: Some(FetchErrorKind::UnknownCategory) }
        );
    }

    #[tokio::test]
    async fn unexplained_exit_has_no_kind() {
        let outcome = sh("exit 3").run_attempt(0, Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Failed { exit_code: Some(3), kind: None });
    }

    #[tokio::test]
    async fn hung_attempt_times_out() {
        let started = std::time::Instant::now();
        let outcome = sh("sleep 30").run_attempt(0, Duration::from_millis(200)).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let mut runner = ProcessRunner::new("/nonexistent/get-data");
        let err = runner.run_attempt(0, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, BatchError::Spawn { .. }));
    }

    #[tokio::test]
    async fn failure_line_is_kept_when_a_straggler_holds_stderr_open() {
        let mut runner = sh("echo 'FETCH_FAILED kind=export_timeout index=2' >&2; sleep 30 & exit 1");
        let started = std::time::Instant::now();
        let outcome = runner.run_attempt(2, Duration::from_secs(20)).await.unwrap();
        assert_eq!(
            outcome,
            AttemptOutcome::Failed { exit_code: Some(1), kind: Some(FetchErrorKind::ExportTimeout) }
        );
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    /// Running and not a zombie waiting to be reaped.
    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => !stat.rsplit(')').next().unwrap_or("").trim_start().starts_with('Z'),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_processes_the_attempt_spawned() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("browser.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());

        let outcome = sh(&script).run_attempt(0, Duration::from_millis(500)).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::TimedOut);

        let pid: u32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while is_running(pid) && std::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!is_running(pid), "process {pid} outlived its attempt");
    }
}
