//! Runs an [`Invocation`] as a child process and streams its output.
//!
//! Every started process gets three Tokio tasks: one draining stdout, one
//! draining stderr, and a supervisor that owns the [`Child`], reaps it, waits
//! for both drains and then publishes the terminal [`ExecutionState`]. The
//! state lives in a `watch` channel written only by the supervisor, so a
//! handle observes exactly one terminal transition.

use crate::argv::Invocation;
use crate::env::Environment;
use crate::error::ProcessStartError;
use crate::resolve::find_program;
use parking_lot::Mutex;
use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamOrigin {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamOrigin::Stdout => "stdout",
            StreamOrigin::Stderr => "stderr",
        })
    }
}

/// Destination for output lines.
///
/// Called from the drain tasks, possibly from two tasks at once. Lines of a
/// single stream arrive in order; lines of different streams are not ordered
/// relative to each other.
pub trait OutputSink: Send + Sync + 'static {
    fn emit(&self, origin: StreamOrigin, line: &str);
}

impl<F> OutputSink for F
where
    F: Fn(StreamOrigin, &str) + Send + Sync + 'static,
{
    fn emit(&self, origin: StreamOrigin, line: &str) {
        self(origin, line)
    }
}

/// Echoes stdout lines to stdout and stderr lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn emit(&self, origin: StreamOrigin, line: &str) {
        match origin {
            StreamOrigin::Stdout => println!("{line}"),
            StreamOrigin::Stderr => eprintln!("{line}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub origin: StreamOrigin,
    pub text: String,
}

/// Forwards lines into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink(mpsc::UnboundedSender<OutputLine>);

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutputLine>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }
}

impl OutputSink for ChannelSink {
    fn emit(&self, origin: StreamOrigin, line: &str) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.0.send(OutputLine {
            origin,
            text: line.to_string(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Running,
    /// The process exited on its own (or before a stop request took effect).
    Completed { exit_code: i32 },
    /// The process was stopped through [`ExecutionHandle::stop`].
    Terminated { exit_code: i32 },
    FailedToStart,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionState::Running)
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecutionState::Completed { exit_code } | ExecutionState::Terminated { exit_code } => {
                Some(*exit_code)
            }
            ExecutionState::Running | ExecutionState::FailedToStart => None,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionState::Running => f.write_str("running"),
            ExecutionState::Completed { exit_code } => write!(f, "completed with exit code {exit_code}"),
            ExecutionState::Terminated { exit_code } => write!(f, "terminated with exit code {exit_code}"),
            ExecutionState::FailedToStart => f.write_str("failed to start"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// How long a stopped process may take to exit after SIGTERM before it
    /// is killed.
    pub stop_grace: Duration,
    /// How long to keep draining output once the process is gone. Only
    /// matters when a grandchild keeps the pipes open.
    pub drain_timeout: Duration,
    /// Environment and working directory of the child.
    pub env: Environment,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(5),
            env: Environment::capture(),
        }
    }
}

/// Launches invocations. Each launch is single-shot: nothing is retried or
/// restarted.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Spawn the invocation and return immediately.
    ///
    /// On a start failure the handle is already in
    /// [`ExecutionState::FailedToStart`], [`ExecutionHandle::start_error`]
    /// carries the reason and `sink` is never called.
    pub async fn start<S: OutputSink>(&self, invocation: &Invocation, sink: S) -> ExecutionHandle {
        let argv = invocation.argv();
        match self.spawn(invocation) {
            Ok(child) => {
                info!(pid = ?child.id(), argv = ?argv, "process started");
                ExecutionHandle::running(argv, child, Arc::new(sink), &self.config)
            }
            Err(e) => {
                warn!(argv = ?argv, "{e}");
                ExecutionHandle::failed(argv, e)
            }
        }
    }

    fn spawn(&self, invocation: &Invocation) -> Result<Child, ProcessStartError> {
        let env = &self.config.env;
        let program = find_program(env, &invocation.runtime).ok_or_else(|| {
            ProcessStartError::RuntimeNotFound {
                runtime: invocation.runtime.clone(),
            }
        })?;
        if !env.resolve(&invocation.module_path).exists() {
            return Err(ProcessStartError::ModuleNotFound {
                path: invocation.module_path.clone(),
            });
        }

        let mut command = Command::new(&program);
        command
            .arg(&invocation.module_path)
            .args(&invocation.args)
            .env_clear()
            .envs(&env.vars)
            .current_dir(&env.current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so a stop reaches everything the command spawned.
        #[cfg(unix)]
        command.process_group(0);
        command
            .spawn()
            .map_err(|source| ProcessStartError::Spawn {
                program: program.to_string_lossy().into_owned(),
                source,
            })
    }
}

/// One invocation, running or finished.
///
/// All methods take `&self`; wrap the handle in an `Arc` to wait and stop
/// from different tasks.
#[derive(Debug)]
pub struct ExecutionHandle {
    argv: Vec<String>,
    pid: Option<u32>,
    state: watch::Receiver<ExecutionState>,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    start_error: Option<ProcessStartError>,
}

impl ExecutionHandle {
    fn running(
        argv: Vec<String>,
        mut child: Child,
        sink: Arc<dyn OutputSink>,
        config: &ExecutorConfig,
    ) -> Self {
        let pid = child.id();
        let (state_tx, state_rx) = watch::channel(ExecutionState::Running);
        let (stop_tx, stop_rx) = oneshot::channel();
        let drains = [
            child
                .stdout
                .take()
                .map(|out| drain(out, StreamOrigin::Stdout, sink.clone())),
            child
                .stderr
                .take()
                .map(|err| drain(err, StreamOrigin::Stderr, sink)),
        ];
        tokio::spawn(supervise(
            child,
            drains,
            stop_rx,
            state_tx,
            config.stop_grace,
            config.drain_timeout,
        ));
        Self {
            argv,
            pid,
            state: state_rx,
            stop: Mutex::new(Some(stop_tx)),
            start_error: None,
        }
    }

    fn failed(argv: Vec<String>, error: ProcessStartError) -> Self {
        let (_, state) = watch::channel(ExecutionState::FailedToStart);
        Self {
            argv,
            pid: None,
            state,
            stop: Mutex::new(None),
            start_error: Some(error),
        }
    }

    /// The exact argument vector the process was (or would have been)
    /// started with.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ExecutionState {
        *self.state.borrow()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.state().exit_code()
    }

    pub fn start_error(&self) -> Option<&ProcessStartError> {
        self.start_error.as_ref()
    }

    /// Wait for the terminal state. All output has been delivered to the
    /// sink by the time this returns.
    pub async fn wait(&self) -> ExecutionState {
        let current = self.state();
        if current.is_terminal() {
            return current;
        }
        let mut state = self.state.clone();
        let terminal = match state.wait_for(ExecutionState::is_terminal).await {
            Ok(terminal) => Some(*terminal),
            Err(_) => None,
        };
        terminal.unwrap_or_else(|| *state.borrow())
    }

    /// Stop the process: SIGTERM first, a kill once the grace period runs out.
    ///
    /// Idempotent. Calls after the first one, or on a finished handle, only
    /// wait for and return the terminal state. If the process exits on its
    /// own before the request is acted upon, the state is `Completed`.
    pub async fn stop(&self) -> ExecutionState {
        let request = self.stop.lock().take();
        if let Some(request) = request
            && !self.state().is_terminal()
        {
            debug!(pid = ?self.pid, "stop requested");
            // The supervisor is gone only if the process already exited.
            let _ = request.send(());
        }
        self.wait().await
    }
}

fn drain<R>(stream: R, origin: StreamOrigin, sink: Arc<dyn OutputSink>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => sink.emit(origin, &String::from_utf8_lossy(strip_newline(&buf))),
                Err(e) => {
                    warn!(%origin, "reading output failed: {e}");
                    break;
                }
            }
        }
        debug!(%origin, "stream closed");
    })
}

fn strip_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

enum Outcome {
    Exited(io::Result<ExitStatus>),
    StopRequested,
}

async fn supervise(
    mut child: Child,
    drains: [Option<JoinHandle<()>>; 2],
    stop: oneshot::Receiver<()>,
    state: watch::Sender<ExecutionState>,
    stop_grace: Duration,
    drain_timeout: Duration,
) {
    let pid = child.id();
    // A dropped handle closes `stop` without a request; that branch is then
    // disabled and the process is simply reaped.
    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        Ok(()) = stop => Outcome::StopRequested,
    };
    let terminal = match outcome {
        Outcome::Exited(status) => ExecutionState::Completed {
            exit_code: exit_code(status),
        },
        Outcome::StopRequested => terminate(&mut child, stop_grace).await,
    };

    let deadline = tokio::time::Instant::now() + drain_timeout;
    for drain in drains.into_iter().flatten() {
        let abort = drain.abort_handle();
        if tokio::time::timeout_at(deadline, drain).await.is_err() {
            warn!(?pid, "output still open after exit, detaching");
            abort.abort();
        }
    }

    info!(?pid, "process {terminal}");
    state.send_replace(terminal);
}

async fn terminate(child: &mut Child, grace: Duration) -> ExecutionState {
    if let Ok(Some(status)) = child.try_wait() {
        return ExecutionState::Completed {
            exit_code: exit_code(Ok(status)),
        };
    }

    let group = child.id();
    signal_group(child, group, Signal::Term);
    let status = match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            // Leftovers of the group would keep the pipes open.
            signal_group(child, group, Signal::Kill);
            status
        }
        Err(_) => {
            warn!(pid = ?group, "no exit {}ms after SIGTERM, killing", grace.as_millis());
            signal_group(child, group, Signal::Kill);
            child.wait().await
        }
    };
    ExecutionState::Terminated {
        exit_code: exit_code(status),
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

/// Signal the process group led by the child. `group` is the pid read before
/// the child was reaped.
#[cfg(unix)]
fn signal_group(child: &mut Child, group: Option<u32>, kind: Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::{self, killpg};
    use nix::unistd::Pid;

    let Some(group) = group else {
        return;
    };
    let sig = match kind {
        Signal::Term => signal::Signal::SIGTERM,
        Signal::Kill => signal::Signal::SIGKILL,
    };
    match killpg(Pid::from_raw(group as i32), sig) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => {
            warn!(group, "{sig} to process group failed: {e}");
            let _ = child.start_kill();
        }
    }
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child, _group: Option<u32>, _kind: Signal) {
    if let Err(e) = child.start_kill() {
        warn!("kill failed: {e}");
    }
}

fn exit_code(status: io::Result<ExitStatus>) -> i32 {
    match status {
        Ok(status) => status.code().unwrap_or_else(|| terminated_by_signal(status)),
        Err(e) => {
            warn!("waiting for process failed: {e}");
            -1
        }
    }
}

/// Shell convention: `128 + signal` for signal deaths.
#[cfg(unix)]
fn terminated_by_signal(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = status.signal() {
        128 + signal
    } else if status.core_dumped() {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_status: ExitStatus) -> i32 {
    -1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("script.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn sh(module: &Path, args: &[&str]) -> Invocation {
        Invocation::new("sh", module, args.iter().map(|a| a.to_string()).collect())
    }

    fn quick() -> Executor {
        Executor::new(ExecutorConfig {
            stop_grace: Duration::from_millis(300),
            drain_timeout: Duration::from_millis(300),
            ..ExecutorConfig::default()
        })
    }

    fn collect(rx: &mut mpsc::UnboundedReceiver<OutputLine>) -> Vec<OutputLine> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    fn stdout(text: &str) -> OutputLine {
        OutputLine {
            origin: StreamOrigin::Stdout,
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn streams_stdout_lines_in_order_then_completes() {
        let dir = tempfile::tempdir().unwrap();
        let module = script(&dir, "echo one\necho two\necho three\n");
        let (sink, mut rx) = ChannelSink::new();

        let handle = quick().start(&sh(&module, &[]), sink).await;
        assert_eq!(handle.wait().await, ExecutionState::Completed { exit_code: 0 });

        assert_eq!(
            collect(&mut rx),
            vec![stdout("one"), stdout("two"), stdout("three")]
        );
        assert_eq!(handle.exit_code(), Some(0));
        assert!(handle.start_error().is_none());
    }

    #[tokio::test]
    async fn tags_stderr_and_reports_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let module = script(&dir, "echo oops >&2\necho fine\nexit 3\n");
        let (sink, mut rx) = ChannelSink::new();

        let handle = quick().start(&sh(&module, &[]), sink).await;
        assert_eq!(handle.wait().await, ExecutionState::Completed { exit_code: 3 });

        let lines = collect(&mut rx);
        assert_eq!(lines.len(), 2);
        assert!(lines.contains(&OutputLine {
            origin: StreamOrigin::Stderr,
            text: "oops".into(),
        }));
        assert!(lines.contains(&stdout("fine")));
    }

    #[tokio::test]
    async fn passes_arguments_and_flushes_unterminated_line() {
        let dir = tempfile::tempdir().unwrap();
        let module = script(
            &dir,
            "printf '%s|' \"$@\"\nprintf '\\n'\nprintf 'crlf\\r\\n'\nprintf 'tail'\n",
        );
        let (sink, mut rx) = ChannelSink::new();

        let handle = quick()
            .start(&sh(&module, &["serve", "--host", "0.0.0.0"]), sink)
            .await;
        assert_eq!(
            handle.argv(),
            [
                "sh".to_string(),
                module.to_string_lossy().into_owned(),
                "serve".into(),
                "--host".into(),
                "0.0.0.0".into()
            ]
        );
        handle.wait().await;

        assert_eq!(
            collect(&mut rx),
            vec![stdout("serve|--host|0.0.0.0|"), stdout("crlf"), stdout("tail")]
        );
    }

    #[tokio::test]
    async fn missing_module_fails_to_start_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sink = move |_: StreamOrigin, _: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
        };

        let missing = dir.path().join("nope.py");
        let handle = quick().start(&sh(&missing, &[]), sink).await;

        assert_eq!(handle.state(), ExecutionState::FailedToStart);
        assert_eq!(handle.wait().await, ExecutionState::FailedToStart);
        assert_eq!(handle.stop().await, ExecutionState::FailedToStart);
        assert!(matches!(
            handle.start_error(),
            Some(ProcessStartError::ModuleNotFound { path }) if *path == missing
        ));
        assert_eq!(handle.exit_code(), None);
        assert_eq!(handle.pid(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_runtime_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let module = script(&dir, "echo hi\n");
        let invocation = Invocation::new("no-such-runtime-4711", &module, Vec::new());

        let handle = quick().start(&invocation, ConsoleSink).await;
        assert_eq!(handle.state(), ExecutionState::FailedToStart);
        assert!(matches!(
            handle.start_error(),
            Some(ProcessStartError::RuntimeNotFound { runtime }) if runtime == "no-such-runtime-4711"
        ));
    }

    #[tokio::test]
    async fn stop_terminates_a_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let module = script(&dir, "echo started\nexec sleep 30\n");
        let (sink, mut rx) = ChannelSink::new();

        let handle = quick().start(&sh(&module, &[]), sink).await;
        assert_eq!(rx.recv().await, Some(stdout("started")));
        assert_eq!(handle.state(), ExecutionState::Running);

        let state = handle.stop().await;
        assert_eq!(state, ExecutionState::Terminated { exit_code: 143 });
        assert_eq!(handle.state(), state);
        assert_eq!(handle.stop().await, state);
    }

    #[tokio::test]
    async fn stop_kills_after_grace_period() {
        let dir = tempfile::tempdir().unwrap();
        let module = script(&dir, "trap '' TERM\necho ready\nexec sleep 30\n");
        let (sink, mut rx) = ChannelSink::new();

        let handle = quick().start(&sh(&module, &[]), sink).await;
        assert_eq!(rx.recv().await, Some(stdout("ready")));

        assert_eq!(
            handle.stop().await,
            ExecutionState::Terminated { exit_code: 137 }
        );
    }

    #[tokio::test]
    async fn stop_after_natural_exit_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let module = script(&dir, "exit 0\n");

        let handle = quick().start(&sh(&module, &[]), ConsoleSink).await;
        let done = handle.wait().await;
        assert_eq!(done, ExecutionState::Completed { exit_code: 0 });

        assert_eq!(handle.stop().await, done);
        assert_eq!(handle.stop().await, done);
        assert_eq!(handle.state(), done);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_stops_agree() {
        let dir = tempfile::tempdir().unwrap();
        let module = script(&dir, "exec sleep 30\n");

        let handle = Arc::new(quick().start(&sh(&module, &[]), ConsoleSink).await);
        let (a, b) = tokio::join!(handle.stop(), handle.stop());

        assert_eq!(a, b);
        assert!(matches!(a, ExecutionState::Terminated { .. }));
    }

    fn alive(pid: i32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        if kill(Pid::from_raw(pid), None).is_err() {
            return false;
        }
        // A zombie is dead already, it only waits to be reaped.
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => !stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| rest.trim_start().starts_with('Z')),
            Err(_) => true,
        }
    }

    async fn gone(pid: i32) -> bool {
        for _ in 0..40 {
            if !alive(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn stop_reaches_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let module = script(&dir, "sleep 30 &\necho $!\nwait\n");
        let (sink, mut rx) = ChannelSink::new();
        let executor = Executor::new(ExecutorConfig {
            stop_grace: Duration::from_millis(300),
            drain_timeout: Duration::from_secs(5),
            ..ExecutorConfig::default()
        });

        let handle = executor.start(&sh(&module, &[]), sink).await;
        let sleeper: i32 = rx.recv().await.unwrap().text.parse().unwrap();
        assert!(alive(sleeper));

        let started = std::time::Instant::now();
        let state = handle.stop().await;
        assert_eq!(state, ExecutionState::Terminated { exit_code: 143 });
        // Pipes close with the group instead of running into the drain timeout.
        assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());
        assert!(gone(sleeper).await, "background sleep {sleeper} survived");
    }

    #[tokio::test]
    async fn drains_share_one_deadline() {
        let dir = tempfile::tempdir().unwrap();
        // The orphaned sleep keeps both pipes open after the script exits.
        let module = script(&dir, "sleep 30 &\necho $!\n");
        let (sink, mut rx) = ChannelSink::new();
        let executor = Executor::new(ExecutorConfig {
            stop_grace: Duration::from_millis(300),
            drain_timeout: Duration::from_millis(1000),
            ..ExecutorConfig::default()
        });

        let started = std::time::Instant::now();
        let handle = executor.start(&sh(&module, &[]), sink).await;
        let state = handle.wait().await;
        let elapsed = started.elapsed();

        let sleeper: i32 = rx.recv().await.unwrap().text.parse().unwrap();
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(sleeper),
            nix::sys::signal::Signal::SIGKILL,
        );

        assert_eq!(state, ExecutionState::Completed { exit_code: 0 });
        assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1800), "{elapsed:?}");
    }

    #[tokio::test]
    async fn terminate_after_exit_reports_completion() {
        let mut child = Command::new("sh").arg("-c").arg("exit 5").spawn().unwrap();
        // Exited but not yet reaped.
        tokio::time::sleep(Duration::from_millis(300)).await;

        let state = terminate(&mut child, Duration::from_millis(300)).await;
        assert_eq!(state, ExecutionState::Completed { exit_code: 5 });
    }

    #[tokio::test]
    async fn stop_racing_a_quick_exit_reports_once() {
        let dir = tempfile::tempdir().unwrap();
        let module = script(&dir, "exit 5\n");
        let transitions = Arc::new(AtomicUsize::new(0));

        let handle = quick().start(&sh(&module, &[]), ConsoleSink).await;
        let mut states = handle.state.clone();
        let counter = transitions.clone();
        let watcher = tokio::spawn(async move {
            while states.changed().await.is_ok() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stopped = handle.stop().await;
        assert_eq!(stopped, ExecutionState::Completed { exit_code: 5 });
        assert_eq!(handle.wait().await, stopped);
        assert_eq!(handle.stop().await, stopped);

        watcher.await.unwrap();
        assert_eq!(transitions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn strip_newline_variants() {
        assert_eq!(strip_newline(b"a\n"), b"a");
        assert_eq!(strip_newline(b"a\r\n"), b"a");
        assert_eq!(strip_newline(b"a"), b"a");
        assert_eq!(strip_newline(b"\n"), b"");
    }

    #[test]
    fn state_exit_codes() {
        assert_eq!(ExecutionState::Running.exit_code(), None);
        assert_eq!(ExecutionState::FailedToStart.exit_code(), None);
        assert_eq!(ExecutionState::Terminated { exit_code: 143 }.exit_code(), Some(143));
        assert!(!ExecutionState::Running.is_terminal());
        assert!(ExecutionState::FailedToStart.is_terminal());
    }
}
