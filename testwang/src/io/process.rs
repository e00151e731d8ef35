//! Helpers for running the runner child process with optional live echo.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::error::RunnerError;

/// Which child stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Destination for raw child output while it runs.
pub trait EchoSink: Send + Sync {
    fn echo(&self, stream: StreamKind, chunk: &[u8]) -> std::io::Result<()>;
}

/// Forward child output to this process's stdout/stderr.
pub struct ConsoleEcho;

impl EchoSink for ConsoleEcho {
    fn echo(&self, stream: StreamKind, chunk: &[u8]) -> std::io::Result<()> {
        match stream {
            StreamKind::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(chunk)?;
                out.flush()
            }
            StreamKind::Stderr => {
                let mut err = std::io::stderr().lock();
                err.write_all(chunk)?;
                err.flush()
            }
        }
    }
}

/// How the child finished.
#[derive(Debug)]
pub struct ChildExit {
    pub status: ExitStatus,
    pub timed_out: bool,
    pub elapsed: Duration,
}

/// Run `cmd` to completion.
///
/// With a sink, stdout/stderr are forwarded chunk by chunk as they arrive.
/// Without one, both go to the null device; nothing is buffered. `timeout`
/// of `None` waits for as long as the child runs.
///
/// With a timeout the child leads its own process group (on Unix), and the
/// whole group is killed when the limit passes, so helper processes the
/// runner started cannot keep the cycle alive through inherited pipes.
#[instrument(skip_all, fields(echo = sink.is_some(), timeout_secs = timeout.map(|t| t.as_secs())))]
pub fn run_child(
    mut cmd: Command,
    sink: Option<Arc<dyn EchoSink>>,
    timeout: Option<Duration>,
) -> Result<ChildExit, RunnerError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.stdin(Stdio::null());
    if sink.is_some() {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    } else {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }
    if timeout.is_some() {
        set_process_group(&mut cmd);
    }

    debug!(%program, "spawning child process");
    let started = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            error!(%program, err = %source, "failed to spawn runner");
            return Err(RunnerError::Launch { program, source });
        }
    };

    let forwarders = sink.map(|sink| spawn_forwarders(&mut child, sink));

    let mut timed_out = false;
    let status = match timeout {
        None => child.wait().map_err(|source| RunnerError::Io {
            action: "wait",
            source,
        })?,
        Some(limit) => match child
            .wait_timeout(limit)
            .map_err(|source| RunnerError::Io {
                action: "wait",
                source,
            })? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = limit.as_secs(), "runner timed out, killing");
                timed_out = true;
                kill_tree(&mut child).map_err(|source| RunnerError::Io {
                    action: "kill",
                    source,
                })?;
                child.wait().map_err(|source| RunnerError::Io {
                    action: "wait after kill",
                    source,
                })?
            }
        },
    };

    if let Some(handles) = forwarders {
        let grace = timed_out.then_some(FORWARDER_GRACE);
        join_forwarders(handles, grace);
    }

    let elapsed = started.elapsed();
    debug!(exit_code = ?status.code(), timed_out, elapsed_ms = elapsed.as_millis() as u64, "child finished");
    Ok(ChildExit {
        status,
        timed_out,
        elapsed,
    })
}

/// How long forwarders may keep draining after a timeout kill.
const FORWARDER_GRACE: Duration = Duration::from_millis(500);

#[cfg(unix)]
fn set_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn set_process_group(_cmd: &mut Command) {}

/// Kill the child's process group, falling back to the child alone.
#[cfg(unix)]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(child.id()).map_err(std::io::Error::other)?;
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => Ok(()),
        Err(errno) => {
            warn!(pgid, err = %errno, "kill process group failed, killing child only");
            child.kill()
        }
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}

/// Join forwarder threads. With a grace period, threads still blocked on a
/// pipe held open by an escaped process are detached once it runs out.
fn join_forwarders(handles: Vec<thread::JoinHandle<()>>, grace: Option<Duration>) {
    if let Some(grace) = grace {
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline && !handles.iter().all(thread::JoinHandle::is_finished) {
            thread::sleep(Duration::from_millis(10));
        }
    }
    for handle in handles {
        if grace.is_some() && !handle.is_finished() {
            warn!("output forwarder still blocked after timeout, detaching");
            continue;
        }
        if handle.join().is_err() {
            warn!("output forwarder thread panicked");
        }
    }
}

fn spawn_forwarders(child: &mut Child, sink: Arc<dyn EchoSink>) -> Vec<thread::JoinHandle<()>> {
    let mut handles = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        let sink = Arc::clone(&sink);
        handles.push(thread::spawn(move || {
            forward(stdout, StreamKind::Stdout, sink.as_ref());
        }));
    }
    if let Some(stderr) = child.stderr.take() {
        handles.push(thread::spawn(move || {
            forward(stderr, StreamKind::Stderr, sink.as_ref());
        }));
    }
    handles
}

/// Copy a pipe into the sink until EOF. Sink failures are logged once and
/// the pipe is still drained so the child never blocks on a full pipe.
fn forward<R: Read>(mut reader: R, stream: StreamKind, sink: &dyn EchoSink) {
    let mut chunk = [0u8; 8192];
    let mut sink_ok = true;
    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(?stream, err = %err, "read child output failed");
                break;
            }
        };
        if sink_ok && let Err(err) = sink.echo(stream, &chunk[..n]) {
            warn!(?stream, err = %err, "echo sink failed, discarding further output");
            sink_ok = false;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        stdout: Mutex<Vec<u8>>,
        stderr: Mutex<Vec<u8>>,
    }

    impl EchoSink for CollectingSink {
        fn echo(&self, stream: StreamKind, chunk: &[u8]) -> std::io::Result<()> {
            let target = match stream {
                StreamKind::Stdout => &self.stdout,
                StreamKind::Stderr => &self.stderr,
            };
            target
                .lock()
                .map_err(|_| std::io::Error::other("poisoned"))?
                .extend_from_slice(chunk);
            Ok(())
        }
    }

    fn shell(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn echoes_both_streams_to_sink() {
        let sink = Arc::new(CollectingSink::default());
        let exit = run_child(
            shell("echo out; echo err 1>&2; exit 3"),
            Some(sink.clone() as Arc<dyn EchoSink>),
            None,
        )
        .expect("run");
        assert_eq!(exit.status.code(), Some(3));
        assert!(!exit.timed_out);
        assert_eq!(sink.stdout.lock().expect("lock").as_slice(), b"out\n");
        assert_eq!(sink.stderr.lock().expect("lock").as_slice(), b"err\n");
    }

    #[test]
    fn runs_without_sink() {
        let exit = run_child(shell("echo ignored"), None, None).expect("run");
        assert!(exit.status.success());
    }

    #[test]
    fn kills_child_on_timeout() {
        let exit = run_child(shell("sleep 5"), None, Some(Duration::from_millis(100))).expect("run");
        assert!(exit.timed_out);
        assert!(!exit.status.success());
    }

    #[test]
    fn timeout_bounds_cycle_even_when_helpers_hold_the_pipes() {
        let sink = Arc::new(CollectingSink::default());
        let started = Instant::now();
        let exit = run_child(
            shell("echo started; sleep 4; true"),
            Some(sink.clone() as Arc<dyn EchoSink>),
            Some(Duration::from_millis(200)),
        )
        .expect("run");
        assert!(exit.timed_out);
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "took {:?}",
            started.elapsed()
        );
        assert_eq!(sink.stdout.lock().expect("lock").as_slice(), b"started\n");
    }

    #[test]
    fn timeout_kills_background_helpers() {
        let temp = tempfile::tempdir().expect("tempdir");
        let marker = temp.path().join("helper-survived");
        let script = format!("(sleep 1; touch {}) & sleep 5", marker.display());
        let exit = run_child(shell(&script), None, Some(Duration::from_millis(200))).expect("run");
        assert!(exit.timed_out);
        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let cmd = Command::new("/definitely/not/a/real/python");
        let err = run_child(cmd, None, None).expect_err("launch");
        assert!(matches!(err, RunnerError::Launch { .. }));
    }
}
