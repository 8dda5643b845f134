//! # External Tool Runner
//!
//! Runs one toolchain invocation with a hard timeout. stdout and stderr are
//! drained on their own threads while the child runs, so a chatty tool
//! cannot fill a pipe and stall. On unix the child leads its own process
//! group; when the timeout expires the whole group is killed, the child is
//! reaped, and whatever output was captured so far is returned without
//! waiting on descendants that still hold a pipe.

use std::fmt;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use wait_timeout::ChildExt;

/// How long captured pipes may keep draining once the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(200);
const DRAIN_POLL: Duration = Duration::from_millis(10);

/// The toolchain phase an invocation belongs to. Each has its own timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Build,
    Setup,
    Prove,
    Verify,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Setup => "setup",
            Self::Prove => "prove",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured output of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A toolchain invocation that did not succeed.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The program could not be started.
    #[error("{phase}: failed to spawn `{program}`: {source}")]
    Spawn {
        phase: Phase,
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The program exited unsuccessfully.
    #[error("{phase}: `{program}` exited with {status}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    NonZeroExit {
        phase: Phase,
        program: String,
        status: String,
        stdout: String,
        stderr: String,
    },
    /// The program ran past its phase bound and was killed.
    #[error("{phase}: `{program}` timed out after {}s\nstdout:\n{stdout}\nstderr:\n{stderr}", timeout.as_secs())]
    Timeout {
        phase: Phase,
        program: String,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },
    /// Waiting on or killing the child failed.
    #[error("{phase}: I/O error while supervising `{program}`: {source}")]
    Io {
        phase: Phase,
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Spawn { phase, .. }
            | Self::NonZeroExit { phase, .. }
            | Self::Timeout { phase, .. }
            | Self::Io { phase, .. } => *phase,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// One pipe drained on a background thread into a shared buffer.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl Capture {
    fn spawn<R: Read + Send + 'static>(reader: Option<R>) -> Option<Self> {
        reader.map(|mut r| {
            let buf = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&buf);
            let handle = std::thread::spawn(move || {
                let mut chunk = [0u8; 4096];
                // A read error truncates the capture; the exit status still decides.
                while let Ok(n) = r.read(&mut chunk) {
                    if n == 0 {
                        break;
                    }
                    sink.lock().extend_from_slice(&chunk[..n]);
                }
            });
            Self { buf, handle }
        })
    }

    /// Everything read by `deadline`. The reader thread is detached if the
    /// pipe is still open then.
    fn finish(self, deadline: Instant) -> String {
        while !self.handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(DRAIN_POLL);
        }
        if self.handle.is_finished() {
            let _ = self.handle.join();
        }
        let text = String::from_utf8_lossy(&self.buf.lock()).into_owned();
        text
    }
}

fn collect(capture: Option<Capture>, deadline: Instant) -> String {
    capture.map(|c| c.finish(deadline)).unwrap_or_default()
}

/// Make the child the leader of a new process group so that everything it
/// forks can be killed together.
#[cfg(unix)]
fn isolate(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_command: &mut Command) {}

/// SIGKILL the child's process group, then the child itself.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: kill(2) takes plain integers and touches no memory of ours.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
    // The child may exit between the timeout and the kill.
    let _ = child.kill();
}

/// Run `command` to completion or until `timeout` elapses.
///
/// stdin is closed; stdout and stderr are captured.
pub fn run_with_timeout(
    phase: Phase,
    command: &mut Command,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    let program = command.get_program().to_string_lossy().into_owned();
    tracing::debug!(%phase, %program, timeout_secs = timeout.as_secs(), "spawning toolchain process");

    let started = Instant::now();
    isolate(command);
    let mut child: Child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            phase,
            program: program.clone(),
            source,
        })?;

    let stdout = Capture::spawn(child.stdout.take());
    let stderr = Capture::spawn(child.stderr.take());

    let io_err = |source| ProcessError::Io {
        phase,
        program: program.clone(),
        source,
    };

    match child.wait_timeout(timeout).map_err(io_err)? {
        Some(status) => {
            let grace = Instant::now() + DRAIN_GRACE;
            let deadline = started.checked_add(timeout).map_or(grace, |d| d.max(grace));
            let stdout = collect(stdout, deadline);
            let stderr = collect(stderr, deadline);
            tracing::debug!(
                %phase,
                %program,
                %status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "toolchain process exited"
            );
            if status.success() {
                Ok(ProcessOutput { stdout, stderr })
            } else {
                Err(ProcessError::NonZeroExit {
                    phase,
                    program,
                    status: status.to_string(),
                    stdout,
                    stderr,
                })
            }
        }
        None => {
            tracing::warn!(%phase, %program, timeout_secs = timeout.as_secs(), "toolchain process timed out, killing");
            terminate(&mut child);
            child.wait().map_err(io_err)?;
            let deadline = Instant::now() + DRAIN_GRACE;
            Err(ProcessError::Timeout {
                phase,
                program,
                timeout,
                stdout: collect(stdout, deadline),
                stderr: collect(stderr, deadline),
            })
        }
    }
}
