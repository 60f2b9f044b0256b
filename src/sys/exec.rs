//! Execution collaborator: fire-and-forget and monitored commands.
//!
//! The only true asynchrony in the module: a command launched by `exec_cb`
//! runs outside the dispatcher's call stack, and the protocol core observes
//! progress purely by polling the shared [`CommandStatus`] snapshot when
//! the owner sends `status_cb`.

use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, warn};

use crate::error::{Result, ServiceInfoError};
use crate::session::CommandStatus;

/// Execution seam used by the protocol core.
pub trait CommandRunner {
    /// Run a command to completion, discarding its output.
    fn run(&mut self, args: &[String]) -> Result<()>;

    /// Start a command in the background and return the initial progress
    /// snapshot. The runner keeps updating its own copy; `refresh` pulls
    /// the latest state.
    fn spawn_monitored(&mut self, args: &[String]) -> Result<CommandStatus>;

    /// Overwrite `status` with live progress of the monitored command.
    /// Called when the owner polls, after the owner's own triple was
    /// stored, so real completion wins over stale owner bookkeeping.
    fn refresh(&mut self, status: &mut CommandStatus) -> Result<()>;

    /// Exit cleanup pass, run at End/Failure regardless of which branch
    /// was mid-flight. Must be safe to call at any point.
    fn cleanup(&mut self);
}

/// Shared progress written by the monitor thread.
type Shared = Arc<Mutex<CommandStatus>>;

/// [`CommandRunner`] backed by `std::process`.
///
/// `spawn_monitored` runs the command on a helper thread that captures
/// stdout and records the exit code into the shared snapshot.
#[derive(Default)]
pub struct ProcessRunner {
    shared: Option<Shared>,
    monitor: Option<JoinHandle<()>>,
}

impl ProcessRunner {
    /// Create a runner with no command in flight.
    pub fn new() -> Self {
        Self::default()
    }

    fn command_for(args: &[String]) -> Result<Command> {
        let program = args
            .first()
            .ok_or_else(|| ServiceInfoError::content("empty command vector"))?;
        let mut cmd = Command::new(program);
        cmd.args(&args[1..]);
        Ok(cmd)
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&mut self, args: &[String]) -> Result<()> {
        let status = Self::command_for(args)?
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        debug!("exec finished with {status}");
        Ok(())
    }

    fn spawn_monitored(&mut self, args: &[String]) -> Result<CommandStatus> {
        // Only one monitored command at a time; a new exec_cb supersedes
        // the previous one.
        self.cleanup();

        let mut cmd = Self::command_for(args)?;
        cmd.stdout(Stdio::piped()).stderr(Stdio::null());

        let initial = CommandStatus::default();
        let shared: Shared = Arc::new(Mutex::new(initial.clone()));

        let worker = Arc::clone(&shared);
        let handle = std::thread::spawn(move || {
            let outcome = cmd.output();
            let mut state = match worker.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            match outcome {
                Ok(out) => {
                    state.result_code = i64::from(out.status.code().unwrap_or(-1));
                    state.output = String::from_utf8_lossy(&out.stdout).into_owned();
                }
                Err(e) => {
                    warn!("monitored command failed to run: {e}");
                    state.result_code = -1;
                }
            }
            state.is_complete = true;
        });

        self.shared = Some(shared);
        self.monitor = Some(handle);
        Ok(initial)
    }

    fn refresh(&mut self, status: &mut CommandStatus) -> Result<()> {
        let Some(shared) = &self.shared else {
            // No command in flight; the owner's triple stands as-is.
            return Ok(());
        };
        let live = shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if live.is_complete {
            status.is_complete = true;
            status.result_code = live.result_code;
        }
        status.output = live.output;
        Ok(())
    }

    fn cleanup(&mut self) {
        self.shared = None;
        if let Some(handle) = self.monitor.take() {
            if handle.join().is_err() {
                warn!("command monitor thread panicked during cleanup");
            }
        }
    }
}
