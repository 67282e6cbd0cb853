/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Game-server process controller.
//!
//! [`ProcessController`] owns the one supervised child process.  It starts
//! the child, writes line commands to its stdin and drives it through the
//! stop ladder:
//!
//! ```text
//! send "exit" ──wait exit_timeout──► SIGTERM ──wait terminate_grace──► SIGKILL
//! ```
//!
//! # Shared handle
//! The running child sits in a single `RwLock<Option<Arc<ServerProcess>>>`
//! slot.  Callers clone the `Arc` out under a short lock and never hold the
//! lock across an `.await`, so the supervisor can swap or clear the slot
//! while announcement tasks are writing.  A writer that lost the race finds
//! an empty slot (or a closed pipe) and gets `false` back.
//!
//! # Console
//! Only stdin is piped.  stdout / stderr stay on the inherited console: some
//! server runtimes behave differently, or refuse to start, when their output
//! is not a terminal.

pub mod diagnostics;
pub mod error;

pub use error::ProcessError;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, error, info, warn};

use crate::config::{RebootConfig, Timings};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Upper bound on a single stdin write.  A server that stopped draining its
/// stdin must not wedge an announcement task or the stop ladder.
const COMMAND_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on reaping a child after SIGKILL.
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// The cooperative shutdown command understood by the server.
pub const EXIT_COMMAND: &str = "exit";

// ── State types ───────────────────────────────────────────────────────────────

/// Lifecycle of the controlled server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Running {
        pid: u32,
    },
    Stopping,
}

/// Result of a bounded wait on the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The child is gone.  `code` is `None` when it died from a signal or
    /// when no child was attached.
    Exited { code: Option<i32> },
    TimedOut,
}

/// Which rung of the stop ladder brought the child down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No child was attached.
    NotRunning,
    /// The child honoured the `exit` command.
    Exited,
    /// The child exited after SIGTERM.
    Terminated,
    /// The child had to be killed.
    Killed,
}

/// How long each rung of the stop ladder waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopLadder {
    pub exit_timeout: Duration,
    pub terminate_grace: Duration,
}

impl From<&Timings> for StopLadder {
    fn from(t: &Timings) -> Self {
        Self {
            exit_timeout: t.exit_timeout,
            terminate_grace: t.terminate_grace,
        }
    }
}

// ── ServerControl ─────────────────────────────────────────────────────────────

/// Operations the supervisor needs from a server controller.
///
/// Implemented by [`ProcessController`]; tests drive the supervisor and the
/// stop ladder through scripted implementations.
pub trait ServerControl: Send + Sync + 'static {
    /// Launches the server and returns its pid once it survived the startup
    /// grace period.
    fn start(&self) -> impl Future<Output = Result<u32, ProcessError>> + Send;

    /// `true` while a child is attached and has not exited.
    fn is_running(&self) -> impl Future<Output = bool> + Send;

    /// Writes `command` plus a newline to the child's stdin.  Returns `false`
    /// (after logging) when there is no child or the pipe is broken.
    fn send_command(&self, command: &str) -> impl Future<Output = bool> + Send;

    /// Waits up to `timeout` for the child to exit.
    fn wait_for_exit(&self, timeout: Duration) -> impl Future<Output = WaitOutcome> + Send;

    /// Asks the child to terminate (SIGTERM).
    fn terminate(&self) -> Result<(), ProcessError>;

    /// Kills the child (SIGKILL) and reaps it.
    fn kill(&self) -> impl Future<Output = Result<(), ProcessError>> + Send;

    /// Runs the full stop ladder.
    fn stop(&self) -> impl Future<Output = Result<StopOutcome, ProcessError>> + Send;

    /// Clears the child reference.
    fn detach(&self);
}

/// The stop ladder, shared by every [`ServerControl`] implementation.
///
/// Each rung runs at most once, in order: `exit` command, bounded wait,
/// SIGTERM, bounded wait, SIGKILL.  A failed `exit` write is not an error;
/// the later rungs take care of the child.
pub async fn escalate_stop<C: ServerControl>(
    server: &C,
    ladder: StopLadder,
) -> Result<StopOutcome, ProcessError> {
    if !server.is_running().await {
        debug!("stop requested but no server is running");
        return Ok(StopOutcome::NotRunning);
    }

    info!("Sending exit command to server");
    server.send_command(EXIT_COMMAND).await;

    if let WaitOutcome::Exited { code } = server.wait_for_exit(ladder.exit_timeout).await {
        info!(?code, "Server exited gracefully");
        return Ok(StopOutcome::Exited);
    }

    warn!(
        timeout_s = ladder.exit_timeout.as_secs(),
        "Server did not exit gracefully, terminating..."
    );
    server.terminate()?;

    if let WaitOutcome::Exited { code } = server.wait_for_exit(ladder.terminate_grace).await {
        info!(?code, "Server terminated");
        return Ok(StopOutcome::Terminated);
    }

    warn!(
        grace_s = ladder.terminate_grace.as_secs(),
        "Server ignored SIGTERM, killing"
    );
    server.kill().await?;
    Ok(StopOutcome::Killed)
}

// ── ServerProcess ─────────────────────────────────────────────────────────────

/// One spawned server.  Dropped once its exit has been confirmed.
#[derive(Debug)]
pub struct ServerProcess {
    pid: u32,
    child: tokio::sync::Mutex<Child>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
}

impl ServerProcess {
    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin is closed")
        })?;
        let write = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        match tokio::time::timeout(COMMAND_WRITE_TIMEOUT, write).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "server is not reading stdin",
            )),
        }
    }
}

// ── LaunchSpec ────────────────────────────────────────────────────────────────

/// What to launch and where to look for it.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub server_path: PathBuf,
    pub args: Vec<String>,
    /// Fallback directory for relative `server_path`s (the config's directory).
    pub base_dir: PathBuf,
}

impl LaunchSpec {
    pub fn from_config(config: &RebootConfig) -> Self {
        Self {
            server_path: config.server_path.clone(),
            args: config.server_args.clone(),
            base_dir: config.base_dir.clone(),
        }
    }

    /// Finds the executable on disk.
    ///
    /// Candidates, first hit wins: the path as given, the path under
    /// `base_dir`, then the bare file name in the working directory and under
    /// `base_dir`.
    pub fn resolve_executable(&self) -> Result<PathBuf, ProcessError> {
        let mut candidates = vec![self.server_path.clone(), self.base_dir.join(&self.server_path)];
        if let Some(name) = self.server_path.file_name() {
            candidates.push(PathBuf::from(name));
            candidates.push(self.base_dir.join(name));
        }

        // Made absolute without following symlinks, so multi-call binaries
        // still see the name they were invoked by.
        candidates
            .iter()
            .find(|p| p.is_file())
            .and_then(|p| std::path::absolute(p).ok())
            .ok_or_else(|| ProcessError::ExecutableNotFound {
                path: self.server_path.clone(),
            })
    }
}

// ── ProcessController ─────────────────────────────────────────────────────────

/// Owns and drives the supervised server process.
pub struct ProcessController {
    spec: LaunchSpec,
    startup_grace: Duration,
    ladder: StopLadder,
    current: RwLock<Option<Arc<ServerProcess>>>,
    state: Mutex<ServerState>,
}

impl ProcessController {
    pub fn new(spec: LaunchSpec, timings: &Timings) -> Self {
        Self {
            spec,
            startup_grace: timings.startup_grace,
            ladder: StopLadder::from(timings),
            current: RwLock::new(None),
            state: Mutex::new(ServerState::Stopped),
        }
    }

    pub fn state(&self) -> ServerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ServerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Snapshot of the attached process, if any.
    fn current(&self) -> Option<Arc<ServerProcess>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn attach(&self, process: Arc<ServerProcess>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(process);
    }

    /// Clears the slot only if it still holds `process`.
    fn detach_if_current(&self, process: &Arc<ServerProcess>) {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|p| Arc::ptr_eq(p, process)) {
            *slot = None;
            drop(slot);
            self.set_state(ServerState::Stopped);
        }
    }

    async fn spawn_and_verify(&self) -> Result<u32, ProcessError> {
        let exe = self.spec.resolve_executable()?;
        let working_dir = exe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        info!(
            "Starting server: {} {}",
            exe.display(),
            self.spec.args.join(" ")
        );
        info!("Working directory: {}", working_dir.display());

        // The working directory must be the executable's own directory so the
        // server finds its relative config and data files.
        let mut child = Command::new(&exe)
            .args(&self.spec.args)
            .current_dir(&working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                path: exe.clone(),
                source,
            })?;

        let pid = child.id().unwrap_or_default();
        let mut stdin = child.stdin.take();

        // Prime stdin with a blank line.  Servers that block on a line read
        // at startup treat an empty, idle pipe as end-of-input and exit; the
        // blank line is ignored by the console.
        if let Some(pipe) = stdin.as_mut() {
            let prime = async {
                pipe.write_all(b"\n").await?;
                pipe.flush().await
            };
            match prime.await {
                Ok(()) => debug!("Primed stdin with newline"),
                Err(e) => warn!("Could not prime stdin: {}", e),
            }
        }

        tokio::time::sleep(self.startup_grace).await;

        match child.try_wait() {
            Ok(Some(status)) => {
                let code = status.code();
                error!(?code, "Server process exited immediately");
                let hint = diagnostics::report_early_exit(&working_dir);
                return Err(ProcessError::ExitedEarly { code, hint });
            }
            Ok(None) => {}
            Err(source) => return Err(ProcessError::Wait { pid, source }),
        }

        self.attach(Arc::new(ServerProcess {
            pid,
            child: tokio::sync::Mutex::new(child),
            stdin: tokio::sync::Mutex::new(stdin),
        }));
        Ok(pid)
    }

    /// Waits up to `timeout` for a killed child to be reaped.  The handle is
    /// released either way; a child that outlives SIGKILL is left to the OS.
    async fn reap(
        &self,
        process: &Arc<ServerProcess>,
        timeout: Duration,
    ) -> Result<(), ProcessError> {
        let waited = {
            let mut child = process.child.lock().await;
            tokio::time::timeout(timeout, child.wait()).await
        };
        let result = match waited {
            Ok(Ok(status)) => {
                info!(pid = process.pid, code = ?status.code(), "Server process killed");
                Ok(())
            }
            Ok(Err(source)) => Err(ProcessError::Wait {
                pid: process.pid,
                source,
            }),
            Err(_) => {
                error!(
                    pid = process.pid,
                    timeout_s = timeout.as_secs(),
                    "Server process could not be reaped after SIGKILL, releasing it"
                );
                Ok(())
            }
        };
        self.detach_if_current(process);
        result
    }

    /// Re-derives the state from the child slot after an interrupted stop.
    fn settle_state(&self) {
        match self.current() {
            Some(process) => self.set_state(ServerState::Running { pid: process.pid }),
            None => self.set_state(ServerState::Stopped),
        }
    }

    fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
        let Some(process) = self.current() else {
            return Ok(());
        };
        let Ok(raw) = i32::try_from(process.pid) else {
            return Ok(());
        };
        match kill(Pid::from_raw(raw), signal) {
            // Already gone: nothing left to signal.
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(ProcessError::Signal {
                pid: process.pid,
                signal: signal.as_str(),
                source,
            }),
        }
    }
}

impl ServerControl for ProcessController {
    async fn start(&self) -> Result<u32, ProcessError> {
        self.set_state(ServerState::Starting);
        match self.spawn_and_verify().await {
            Ok(pid) => {
                self.set_state(ServerState::Running { pid });
                info!(pid, "Server started");
                Ok(pid)
            }
            Err(e) => {
                self.set_state(ServerState::Stopped);
                Err(e)
            }
        }
    }

    async fn is_running(&self) -> bool {
        let Some(process) = self.current() else {
            return false;
        };
        let polled = process.child.lock().await.try_wait();
        match polled {
            Ok(None) => true,
            Ok(Some(status)) => {
                info!(pid = process.pid, code = ?status.code(), "Server process has exited");
                self.detach_if_current(&process);
                false
            }
            Err(e) => {
                warn!(pid = process.pid, "Could not poll server process: {}", e);
                false
            }
        }
    }

    async fn send_command(&self, command: &str) -> bool {
        let Some(process) = self.current() else {
            error!(command, "Server process not running or stdin not available");
            return false;
        };

        info!("Sending command: {}", command);
        match process.write_line(command).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to send command '{}': {}", command, e);
                false
            }
        }
    }

    async fn wait_for_exit(&self, timeout: Duration) -> WaitOutcome {
        let Some(process) = self.current() else {
            return WaitOutcome::Exited { code: None };
        };

        let waited = {
            let mut child = process.child.lock().await;
            tokio::time::timeout(timeout, child.wait()).await
        };
        match waited {
            Ok(Ok(status)) => {
                info!(pid = process.pid, code = ?status.code(), "Server process exited");
                self.detach_if_current(&process);
                WaitOutcome::Exited {
                    code: status.code(),
                }
            }
            Ok(Err(e)) => {
                // The child can no longer be waited on, so it is not ours to
                // manage any more.
                error!(pid = process.pid, "Error waiting for server exit: {}", e);
                self.detach_if_current(&process);
                WaitOutcome::Exited { code: None }
            }
            Err(_) => {
                warn!(
                    pid = process.pid,
                    timeout_s = timeout.as_secs(),
                    "Server did not exit within timeout period"
                );
                WaitOutcome::TimedOut
            }
        }
    }

    fn terminate(&self) -> Result<(), ProcessError> {
        self.signal(Signal::SIGTERM)
    }

    async fn kill(&self) -> Result<(), ProcessError> {
        let Some(process) = self.current() else {
            return Ok(());
        };
        process
            .child
            .lock()
            .await
            .start_kill()
            .map_err(|source| ProcessError::Kill {
                pid: process.pid,
                source,
            })?;
        self.reap(&process, KILL_REAP_TIMEOUT).await
    }

    async fn stop(&self) -> Result<StopOutcome, ProcessError> {
        self.set_state(ServerState::Stopping);
        let outcome = escalate_stop(self, self.ladder).await;
        match &outcome {
            Ok(StopOutcome::NotRunning) => self.set_state(ServerState::Stopped),
            Ok(_) => {}
            Err(_) => self.settle_state(),
        }
        outcome
    }

    fn detach(&self) {
        let previous = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(process) = previous {
            debug!(pid = process.pid, "Released server process handle");
        }
        self.set_state(ServerState::Stopped);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    // ── Stop ladder against a scripted server ────────────────────────────────

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Command(String),
        Wait(Duration),
        Terminate,
        Kill,
    }

    /// A server that exits only on the rung given by `exits_on`.
    struct ScriptedServer {
        calls: StdMutex<Vec<Call>>,
        running: StdMutex<bool>,
        /// `0` = honours `exit`, `1` = honours SIGTERM, anything else = never.
        exits_on: u8,
        terminated: StdMutex<bool>,
    }

    impl ScriptedServer {
        fn new(exits_on: u8) -> Self {
            Self {
                calls: StdMutex::new(Vec::new()),
                running: StdMutex::new(true),
                exits_on,
                terminated: StdMutex::new(false),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl ServerControl for ScriptedServer {
        async fn start(&self) -> Result<u32, ProcessError> {
            Ok(1)
        }

        async fn is_running(&self) -> bool {
            *self.running.lock().unwrap()
        }

        async fn send_command(&self, command: &str) -> bool {
            self.record(Call::Command(command.to_string()));
            true
        }

        async fn wait_for_exit(&self, timeout: Duration) -> WaitOutcome {
            self.record(Call::Wait(timeout));
            let exits = match self.exits_on {
                0 => true,
                1 => *self.terminated.lock().unwrap(),
                _ => false,
            };
            if exits {
                *self.running.lock().unwrap() = false;
                WaitOutcome::Exited { code: Some(0) }
            } else {
                tokio::time::sleep(timeout).await;
                WaitOutcome::TimedOut
            }
        }

        fn terminate(&self) -> Result<(), ProcessError> {
            self.record(Call::Terminate);
            *self.terminated.lock().unwrap() = true;
            Ok(())
        }

        async fn kill(&self) -> Result<(), ProcessError> {
            self.record(Call::Kill);
            *self.running.lock().unwrap() = false;
            Ok(())
        }

        async fn stop(&self) -> Result<StopOutcome, ProcessError> {
            escalate_stop(self, StopLadder::from(&Timings::default())).await
        }

        fn detach(&self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_server_walks_the_whole_ladder() {
        let server = ScriptedServer::new(u8::MAX);
        let started = tokio::time::Instant::now();

        let outcome = server.stop().await.unwrap();

        assert_eq!(outcome, StopOutcome::Killed);
        assert_eq!(
            server.calls(),
            vec![
                Call::Command("exit".into()),
                Call::Wait(Duration::from_secs(60)),
                Call::Terminate,
                Call::Wait(Duration::from_secs(5)),
                Call::Kill,
            ]
        );
        assert!(started.elapsed() >= Duration::from_secs(65));
    }

    #[tokio::test(start_paused = true)]
    async fn cooperative_server_stops_at_first_rung() {
        let server = ScriptedServer::new(0);
        assert_eq!(server.stop().await.unwrap(), StopOutcome::Exited);
        assert_eq!(
            server.calls(),
            vec![
                Call::Command("exit".into()),
                Call::Wait(Duration::from_secs(60))
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sigterm_is_enough_for_a_server_ignoring_exit() {
        let server = ScriptedServer::new(1);
        assert_eq!(server.stop().await.unwrap(), StopOutcome::Terminated);
        assert_eq!(server.calls().last(), Some(&Call::Wait(Duration::from_secs(5))));
        assert!(!server.calls().contains(&Call::Kill));
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_an_idle_server_does_nothing() {
        let server = ScriptedServer::new(0);
        *server.running.lock().unwrap() = false;
        assert_eq!(server.stop().await.unwrap(), StopOutcome::NotRunning);
        assert!(server.calls().is_empty());
    }

    // ── LaunchSpec::resolve_executable ────────────────────────────────────────

    #[test]
    fn resolves_absolute_path() {
        let spec = LaunchSpec {
            server_path: PathBuf::from("/bin/sh"),
            args: vec![],
            base_dir: PathBuf::from("/nonexistent"),
        };
        assert_eq!(spec.resolve_executable().unwrap(), Path::new("/bin/sh"));
    }

    #[test]
    fn resolves_relative_to_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("Server")).unwrap();
        let exe = dir.path().join("Server").join("game-server");
        std::fs::write(&exe, "").unwrap();

        let spec = LaunchSpec {
            server_path: PathBuf::from("Server/game-server"),
            args: vec![],
            base_dir: dir.path().to_path_buf(),
        };
        assert_eq!(spec.resolve_executable().unwrap(), exe);
    }

    #[test]
    fn falls_back_to_bare_file_name_in_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("game-server");
        std::fs::write(&exe, "").unwrap();

        let spec = LaunchSpec {
            server_path: PathBuf::from("/moved/away/game-server"),
            args: vec![],
            base_dir: dir.path().to_path_buf(),
        };
        assert_eq!(spec.resolve_executable().unwrap(), exe);
    }

    #[test]
    fn missing_executable_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let spec = LaunchSpec {
            server_path: PathBuf::from("no-such-server-binary"),
            args: vec![],
            base_dir: dir.path().to_path_buf(),
        };
        assert!(matches!(
            spec.resolve_executable(),
            Err(ProcessError::ExecutableNotFound { .. })
        ));
    }

    // ── ProcessController against real /bin/sh children ─────────────────────

    fn sh_controller(script: &str, exit_timeout_ms: u64) -> ProcessController {
        let spec = LaunchSpec {
            server_path: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into()],
            base_dir: PathBuf::from("/"),
        };
        let timings = Timings {
            startup_grace: Duration::from_millis(200),
            exit_timeout: Duration::from_millis(exit_timeout_ms),
            terminate_grace: Duration::from_millis(500),
            ..Timings::default()
        };
        ProcessController::new(spec, &timings)
    }

    /// Reads commands and exits on `exit`; the priming blank line is skipped.
    const OBEDIENT: &str = r#"while read line; do [ "$line" = exit ] && exit 0; done"#;

    #[tokio::test]
    async fn obedient_server_starts_and_exits_on_command() {
        let ctl = sh_controller(OBEDIENT, 5_000);

        let pid = ctl.start().await.unwrap();
        assert!(pid > 0);
        assert_eq!(ctl.state(), ServerState::Running { pid });
        assert!(ctl.is_running().await);
        assert!(ctl.send_command("announcement \"hello\"").await);

        assert_eq!(ctl.stop().await.unwrap(), StopOutcome::Exited);
        assert_eq!(ctl.state(), ServerState::Stopped);
        assert!(!ctl.is_running().await);
    }

    #[tokio::test]
    async fn server_exiting_during_grace_period_fails_start() {
        let ctl = sh_controller("exit 3", 5_000);
        let err = ctl.start().await.unwrap_err();
        assert!(matches!(
            err,
            ProcessError::ExitedEarly {
                code: Some(3),
                hint: None
            }
        ));
        assert_eq!(ctl.state(), ServerState::Stopped);
        assert!(!ctl.is_running().await);
    }

    #[tokio::test]
    async fn server_ignoring_exit_is_terminated() {
        let ctl = sh_controller("while read line; do :; done", 300);
        ctl.start().await.unwrap();
        assert_eq!(ctl.stop().await.unwrap(), StopOutcome::Terminated);
        assert!(!ctl.is_running().await);
    }

    #[tokio::test]
    async fn server_ignoring_sigterm_is_killed() {
        let ctl = sh_controller("trap '' TERM; while read line; do :; done", 300);
        ctl.start().await.unwrap();
        assert_eq!(ctl.stop().await.unwrap(), StopOutcome::Killed);
        assert!(!ctl.is_running().await);
    }

    #[tokio::test]
    async fn send_without_a_server_fails_softly() {
        let ctl = sh_controller(OBEDIENT, 5_000);
        assert!(!ctl.send_command("announcement \"nobody home\"").await);
        assert_eq!(ctl.stop().await.unwrap(), StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn send_after_detach_fails_softly() {
        let ctl = sh_controller(OBEDIENT, 5_000);
        ctl.start().await.unwrap();
        let process = ctl.current().unwrap();

        ctl.detach();
        assert!(!ctl.send_command("announcement \"late\"").await);

        // Clean up the orphaned child.
        process.child.lock().await.kill().await.unwrap();
    }

    #[tokio::test]
    async fn missing_executable_fails_start() {
        let spec = LaunchSpec {
            server_path: PathBuf::from("/nonexistent/game-server"),
            args: vec![],
            base_dir: PathBuf::from("/nonexistent"),
        };
        let ctl = ProcessController::new(spec, &Timings::default());
        assert!(matches!(
            ctl.start().await,
            Err(ProcessError::ExecutableNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn startup_primes_stdin_with_a_blank_line() {
        // The first line read must be the blank one, before any command.
        let script = r#"IFS= read -r first; [ -z "$first" ] || exit 8
IFS= read -r second; [ "$second" = hello ] && exit 0; exit 9"#;
        let ctl = sh_controller(script, 5_000);

        ctl.start().await.unwrap();
        assert!(ctl.send_command("hello").await);
        assert!(matches!(
            ctl.wait_for_exit(Duration::from_secs(5)).await,
            WaitOutcome::Exited { code: Some(0) }
        ));
    }

    #[tokio::test]
    async fn early_exit_reports_the_server_log_hint() {
        let dir = tempfile::tempdir().unwrap();
        // Named `sh` so multi-call shells still dispatch on argv[0].
        let exe = dir.path().join("sh");
        std::os::unix::fs::symlink("/bin/sh", &exe).unwrap();

        let script = "mkdir -p logs \
            && echo '[INF] Booting' > logs/server.log \
            && echo '[ERR] Failed to listen on port 5400' >> logs/server.log; \
            exit 1";
        let spec = LaunchSpec {
            server_path: exe,
            args: vec!["-c".into(), script.into()],
            base_dir: dir.path().to_path_buf(),
        };
        let timings = Timings {
            startup_grace: Duration::from_millis(300),
            ..Timings::default()
        };
        let ctl = ProcessController::new(spec, &timings);

        let err = ctl.start().await.unwrap_err();
        assert!(dir.path().join("logs").join("server.log").is_file());
        match err {
            ProcessError::ExitedEarly { code, hint } => {
                assert_eq!(code, Some(1));
                assert_eq!(hint.as_deref(), Some("[ERR] Failed to listen on port 5400"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn interrupted_stop_state_follows_the_child_slot() {
        let ctl = sh_controller(OBEDIENT, 5_000);
        let pid = ctl.start().await.unwrap();

        ctl.set_state(ServerState::Stopping);
        ctl.settle_state();
        assert_eq!(ctl.state(), ServerState::Running { pid });

        ctl.kill().await.unwrap();
        ctl.set_state(ServerState::Stopping);
        ctl.settle_state();
        assert_eq!(ctl.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn reaping_is_bounded_and_releases_the_handle() {
        let ctl = sh_controller(OBEDIENT, 5_000);
        ctl.start().await.unwrap();
        let process = ctl.current().unwrap();

        // Not killed, so it can never be reaped within the bound.
        ctl.reap(&process, Duration::from_millis(100)).await.unwrap();
        assert!(ctl.current().is_none());
        assert_eq!(ctl.state(), ServerState::Stopped);
        assert!(!ctl.send_command("announcement \"gone\"").await);

        process.child.lock().await.kill().await.unwrap();
    }
}
