//! External execution driver for probe scripts.
//!
//! Blocking from the caller's perspective: the child is polled every
//! `poll_interval` for exit, the deadline, and the cancel token.
//! Output pipes are drained on reader threads so a chatty child can
//! never deadlock on a full pipe.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use crate::core::error::{EngineError, ExecutionFailure};
use crate::infra::config::ProbeConfig;

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn cancel(&self)
    {
        self.0
            .store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool
    {
        self.0
            .load(Ordering::SeqCst)
    }
}

/// Interpreter and limits for one run
#[derive(Debug, Clone)]
pub struct ProbeOptions
{
    pub python: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ProbeOptions
{
    fn default() -> Self
    {
        Self::from(&ProbeConfig::default())
    }
}

impl From<&ProbeConfig> for ProbeOptions
{
    fn from(cfg: &ProbeConfig) -> Self
    {
        Self {
            python: cfg
                .python
                .clone(),
            timeout: cfg.timeout(),
            poll_interval: cfg.poll_interval(),
        }
    }
}

/// Output of a clean run
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutput
{
    pub stdout: String,
    pub stderr: String,
}

/// Runs probe scripts with an external interpreter.
#[derive(Debug, Clone, Default)]
pub struct ExecutionDriver
{
    options: ProbeOptions,
}

impl ExecutionDriver
{
    pub fn new(options: ProbeOptions) -> Self
    {
        Self { options }
    }

    /// Execute `script` and return its output.
    ///
    /// A non-zero exit, any stderr output, a timeout, or a spawn
    /// failure is an `ExecutionFailure` carrying what was captured.
    /// A set `cancel` token kills the child and yields `Cancelled`.
    #[instrument(skip(self, script, cancel), fields(python = %self.options.python))]
    pub fn run(
        &self,
        script: &str,
        cancel: &CancelToken,
    ) -> Result<ExecutionOutput, EngineError>
    {
        if cancel.is_cancelled()
        {
            return Err(EngineError::Cancelled);
        }

        // The file must outlive the child; it is removed on drop
        let mut file = tempfile::Builder::new()
            .prefix("fragforge-probe-")
            .suffix(".py")
            .tempfile()
            .map_err(ExecutionFailure::Io)?;
        file.write_all(script.as_bytes())
            .map_err(ExecutionFailure::Io)?;
        file.flush()
            .map_err(ExecutionFailure::Io)?;

        let mut cmd = Command::new(&self.options.python);
        cmd.arg(file.path())
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group so a kill takes grandchildren along
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .map_err(|source| ExecutionFailure::Spawn {
                program: self
                    .options
                    .python
                    .clone(),
                source,
            })?;
        debug!(pid = child.id(), script = %file.path().display(), "probe started");

        let stdout = drain(
            child
                .stdout
                .take(),
        );
        let stderr = drain(
            child
                .stderr
                .take(),
        );

        let deadline = Instant::now() + self.options.timeout;
        let status = loop
        {
            if let Some(status) = child
                .try_wait()
                .map_err(ExecutionFailure::Io)?
            {
                break Some(status);
            }

            if cancel.is_cancelled()
            {
                kill(&mut child);
                let _ = (join(stdout), join(stderr));
                debug!("probe cancelled");
                return Err(EngineError::Cancelled);
            }

            if Instant::now() >= deadline
            {
                kill(&mut child);
                break None;
            }

            thread::sleep(self.options.poll_interval);
        };

        let stdout = join(stdout);
        let stderr = join(stderr);

        let Some(status) = status
        else
        {
            warn!(timeout = ?self.options.timeout, "probe timed out");
            return Err(ExecutionFailure::TimedOut {
                timeout: self.options.timeout,
                stdout,
                stderr,
            }
            .into());
        };

        if !status.success()
        {
            return Err(ExecutionFailure::NonZeroExit { code: status.code(), stdout, stderr }.into());
        }

        if !stderr
            .trim()
            .is_empty()
        {
            return Err(ExecutionFailure::Stderr { stdout, stderr }.into());
        }

        debug!(bytes = stdout.len(), "probe finished");
        Ok(ExecutionOutput { stdout, stderr })
    }
}

/// Read a pipe to the end on its own thread
fn drain<R>(pipe: Option<R>) -> Option<JoinHandle<String>>
where
    R: Read + Send + 'static,
{
    let mut pipe = pipe?;

    Some(thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }))
}

fn join(handle: Option<JoinHandle<String>>) -> String
{
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Kill the child (and its process group on unix), then reap it
fn kill(child: &mut Child)
{
    #[cfg(unix)]
    {
        // Negative pid addresses the whole group
        let pgid = child.id() as libc::pid_t;
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }

    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }

    let _ = child.wait();
}
