//! Boot-configured daemon seam
//!
//! The host boots one daemon alongside the application container. The
//! daemon itself is an external collaborator; this seam only carries its
//! lifecycle. When boot config does not name one, the generic server
//! daemon is used.

use anyhow::Result;
use tracing::info;

/// Start/stop lifecycle of the daemon the host boots
pub trait Daemon: Send {
    fn name(&self) -> &str;

    fn start(&mut self) -> Result<()>;

    /// Stop must tolerate being called on a daemon that never started.
    fn stop(&mut self) -> Result<()>;
}

/// Generic server daemon, booted when no explicit daemon section exists
pub struct ServerDaemon {
    running: bool,
}

impl ServerDaemon {
    pub fn default_boot() -> Box<dyn Daemon> {
        Box::new(Self { running: false })
    }
}

impl Daemon for ServerDaemon {
    fn name(&self) -> &str {
        "server"
    }

    fn start(&mut self) -> Result<()> {
        self.running = true;
        info!(daemon = self.name(), "Daemon started");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.running {
            self.running = false;
            info!(daemon = self.name(), "Daemon stopped");
        }
        Ok(())
    }
}
