//! Activator-owned process handles

use govern_util::{GovernError, Result};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use tracing::debug;

/// Opaque handle binding a governance record to a live OS process.
///
/// Allocated before the spawn attempt, so a swallowed spawn failure leaves
/// a context with no process behind it. Owned exclusively by the activator
/// once attached to an application.
#[derive(Debug, Default)]
pub struct ActivationContext {
    process: Option<ProcessHandle>,
}

impl ActivationContext {
    pub fn new() -> Self {
        Self { process: None }
    }

    /// Spawn the OS process and bind it to this context. No shell
    /// indirection, no inherited stdio.
    pub fn launch(
        &mut self,
        executable: &str,
        working_directory: Option<&Path>,
        args: &[String],
    ) -> Result<u32> {
        let handle = ProcessHandle::spawn(executable, working_directory, args)?;
        let pid = handle.pid;
        self.process = Some(handle);
        Ok(pid)
    }

    /// Whether a process is bound to this context
    pub fn has_process(&self) -> bool {
        self.process.is_some()
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.pid)
    }

    /// Non-blocking exited check. A context with no process counts as
    /// exited, so a failed spawn does not wedge the stop sequence.
    pub fn has_exited(&mut self) -> Result<bool> {
        match self.process.as_mut() {
            Some(p) => p.has_exited(),
            None => Ok(true),
        }
    }

    /// Force-kill the process group
    pub fn kill(&mut self) -> Result<()> {
        match self.process.as_mut() {
            Some(p) => p.kill(),
            None => Ok(()),
        }
    }

    /// Release the underlying process handle, reaping the child if it has
    /// already exited.
    pub fn release(&mut self) -> Result<()> {
        match self.process.take() {
            Some(mut p) => p.release(),
            None => Ok(()),
        }
    }
}

/// Child process in its own process group, with wait/kill operations
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pub pid: u32,
    pgid: u32,
}

impl ProcessHandle {
    /// Spawn a new process in its own process group
    pub fn spawn(
        executable: &str,
        working_directory: Option<&Path>,
        args: &[String],
    ) -> Result<Self> {
        let mut cmd = Command::new(executable);
        cmd.args(args);

        if let Some(dir) = working_directory {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        // The child becomes the leader of its own process group, so a
        // force-kill reaches anything it spawned in turn.
        // SAFETY: This is safe in the pre-exec context
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(|e| {
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
                })?;
                Ok(())
            });
        }

        let child = cmd
            .spawn()
            .map_err(|e| GovernError::spawn(format!("Failed to spawn {}: {}", executable, e)))?;

        let pid = child.id();
        let pgid = pid; // After setsid, pid == pgid

        debug!(pid = pid, executable = %executable, "Process spawned");

        Ok(Self { child, pid, pgid })
    }

    /// Check if the process has exited (non-blocking)
    pub fn has_exited(&mut self) -> Result<bool> {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = self.pid, status = ?status, "Process exited");
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(GovernError::internal(format!("Wait failed: {}", e))),
        }
    }

    /// Send SIGKILL to the process group
    pub fn kill(&mut self) -> Result<()> {
        let pgid = Pid::from_raw(-(self.pgid as i32)); // Negative for process group

        match signal::kill(pgid, Signal::SIGKILL) {
            Ok(()) => {
                debug!(pgid = self.pgid, "Sent SIGKILL to process group");
                Ok(())
            }
            Err(nix::errno::Errno::ESRCH) => {
                // Process already gone
                Ok(())
            }
            Err(e) => Err(GovernError::kill(format!("Failed to send SIGKILL: {}", e))),
        }
    }

    /// Release the handle, reaping the child if it has exited
    pub fn release(&mut self) -> Result<()> {
        match self.child.try_wait() {
            Ok(_) => Ok(()),
            Err(e) => Err(GovernError::internal(format!("Release failed: {}", e))),
        }
    }
}
