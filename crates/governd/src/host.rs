//! Host lifecycle: the two process-body flavors
//!
//! `HostContext` replaces process-wide lifecycle statics with an explicit
//! context threaded through start, the entry loops, and stop. Both
//! flavors share the same start/stop sequence; they differ only in what
//! they block on.

use anyhow::{Context, Result};
use govern_config::Config;
use govern_core::{
    Application, Governor, GovernorBinding, ProcessActivator, TerminalContext,
    TerminalRegistry,
};
use govern_ipc::{BindingUri, ServerEvent, SipcClient, SipcServer, CMD_STOP};
use govern_util::AppName;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Interval between shutdown polls in the interactive console loop
const CONSOLE_POLL: Duration = Duration::from_millis(50);

/// Interval between shutdown polls in the governed wait loop
const GOVERNED_POLL: Duration = Duration::from_secs(5);

/// Console keywords that end the interactive loop
const EXIT_KEYWORDS: [&str; 3] = ["quit", "exit", "stop"];

/// Boot arguments shared by both entry flavors
#[derive(Debug)]
pub struct BootArgs {
    pub config: Config,
    /// Present when this process is itself governed: the URI of the
    /// governor that spawned it, injected through pragma substitution.
    pub governed_uri: Option<BindingUri>,
    pub app_id: Option<String>,
}

/// Explicit host lifecycle state
pub struct HostContext {
    application: Option<Arc<Application>>,
    daemon: Option<Box<dyn crate::daemon::Daemon>>,
    sipc_client: Option<JoinHandle<()>>,
    server_tasks: Vec<JoinHandle<()>>,
}

impl HostContext {
    /// Boot the application container, the control channel, the optional
    /// IPC client back to a governing parent, and the boot-configured
    /// daemon, then start every configured subordinate.
    pub async fn start(boot: BootArgs) -> Result<Self> {
        // Control channel first: pragma substitution needs the resolved port
        let settings = &boot.config.governor;
        let mut server = SipcServer::new(settings.bind_host.clone(), settings.bind_port);
        server
            .start()
            .await
            .context("Failed to bind control channel")?;

        let binding = GovernorBinding {
            scheme: settings.scheme.clone(),
            host: settings.bind_host.clone(),
            port: server.port(),
        };

        let activator = Arc::new(ProcessActivator::new(binding));
        let governor = Arc::new(Governor::new(&boot.config, activator));

        let host_name = boot
            .app_id
            .clone()
            .map(AppName::new)
            .unwrap_or_else(|| AppName::new("governd"));
        let application = Arc::new(Application::new(host_name, governor.clone()));

        let mut events = server
            .take_event_receiver()
            .await
            .expect("Event receiver should be available");

        let server = Arc::new(server);
        let mut server_tasks = Vec::new();

        // Accept loop
        let accept = server.clone();
        server_tasks.push(tokio::spawn(async move {
            if let Err(e) = accept.run().await {
                warn!(error = %e, "Control channel stopped accepting");
            }
        }));

        // Event pump: connection updates land on the governance records
        // independent of start/stop sequencing. Inbound lines from children
        // are remote-terminal commands executed with restricted rights.
        let pump_governor = governor.clone();
        server_tasks.push(tokio::spawn(async move {
            let registry = TerminalRegistry::builtin();
            let restricted = TerminalContext::restricted();
            while let Some(event) = events.recv().await {
                match event {
                    ServerEvent::ChildConnected { app, sender } => {
                        pump_governor.attach_connection(&app, sender).await;
                    }
                    ServerEvent::ChildDisconnected { app } => {
                        pump_governor.detach_connection(&app).await;
                    }
                    ServerEvent::Line { app, line } => {
                        match registry.execute(&pump_governor, &restricted, &line).await {
                            Ok(out) => {
                                debug!(app = %app, output = %out, "Remote command executed");
                            }
                            Err(e) => {
                                warn!(app = %app, error = %e, "Remote command failed");
                            }
                        }
                    }
                }
            }
        }));

        // IPC client back to a governing parent, when this process is a
        // governed child itself. Failure to reach the parent is expected
        // connection loss, not a boot failure.
        let sipc_client = match &boot.governed_uri {
            Some(uri) => match SipcClient::connect(uri).await {
                Ok(client) => {
                    let stop_target = application.clone();
                    Some(tokio::spawn(client.run(move |command| {
                        if command == CMD_STOP {
                            stop_target.stop();
                        } else {
                            debug!(command = %command, "Ignoring unknown command");
                        }
                    })))
                }
                Err(e) => {
                    warn!(uri = %uri, error = %e, "Could not reach governor");
                    None
                }
            },
            None => None,
        };

        let mut daemon = crate::daemon::ServerDaemon::default_boot();
        daemon.start().context("Failed to start boot daemon")?;

        info!(port = server.port(), "Host started");

        governor.start_all().await;

        Ok(Self {
            application: Some(application),
            daemon: Some(daemon),
            sipc_client,
            server_tasks,
        })
    }

    pub fn application(&self) -> Option<&Arc<Application>> {
        self.application.as_ref()
    }

    /// Dispose the daemon, the application, then the IPC client, in that
    /// order, tolerating any being already gone.
    pub async fn stop(&mut self) {
        if let Some(mut daemon) = self.daemon.take() {
            if let Err(e) = daemon.stop() {
                warn!(error = %e, "Daemon stop failed");
            }
        }

        if let Some(application) = self.application.take() {
            application.stop();
            application.governor().stop_all().await;
        }

        if let Some(client) = self.sipc_client.take() {
            client.abort();
        }

        for task in self.server_tasks.drain(..) {
            task.abort();
        }

        info!("Host stopped");
    }
}

/// Interactive flavor: a read-eval loop over console input dispatched to
/// the remote terminal with an explicitly privileged context. Interrupt
/// maps to an application stop request, not process termination.
pub async fn run_interactive(ctx: &HostContext) -> Result<()> {
    let application = ctx
        .application()
        .context("Host has no application")?
        .clone();
    let governor = application.governor().clone();

    let interrupt_target = application.clone();
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            interrupt_target.stop();
        }
    });

    let registry = TerminalRegistry::builtin();
    let terminal_ctx = TerminalContext::privileged();

    // Reader task keeps line buffering away from the poll loop, so a
    // shutdown poll never clips a half-read line
    let (line_tx, mut line_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break, // console closed
                Err(e) => {
                    warn!(error = %e, "Console read error");
                    break;
                }
            }
        }
    });

    'console: loop {
        tokio::select! {
            line = line_rx.recv() => {
                let Some(line) = line else { break 'console };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if EXIT_KEYWORDS.contains(&line) {
                    break 'console;
                }
                // Command failures are printed, never re-raised
                match registry.execute(&governor, &terminal_ctx, line).await {
                    Ok(out) => {
                        if !out.is_empty() {
                            println!("{out}");
                        }
                    }
                    Err(e) => println!("error: {e}"),
                }
            }
            _ = tokio::time::sleep(CONSOLE_POLL) => {
                if application.is_stopping() {
                    break 'console;
                }
            }
        }
    }

    reader.abort();

    Ok(())
}

/// Governed flavor: block until a stop arrives over the control channel,
/// from a signal, or from the governor's own shutdown.
pub async fn run_governed(ctx: &HostContext) -> Result<()> {
    let application = ctx
        .application()
        .context("Host has no application")?
        .clone();

    let interrupt_target = application.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt_target.stop();
        }
    });

    let terminate_target = application.clone();
    tokio::spawn(async move {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    return;
                }
            };
        if sigterm.recv().await.is_some() {
            terminate_target.stop();
        }
    });

    application.wait_for_stop(GOVERNED_POLL).await;

    Ok(())
}
