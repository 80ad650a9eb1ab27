//! Remote administrative terminal
//!
//! Command dispatch goes through an explicit, statically registered
//! command table. Privilege is an explicit value passed into `execute`;
//! there is no ambient privileged state.

use govern_util::{AppName, GovernError, Result};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use crate::Governor;

type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
type Handler = for<'a> fn(&'a Governor, Vec<String>) -> HandlerFuture<'a>;

/// Privilege scope for one terminal execution
#[derive(Debug, Clone, Copy)]
pub struct TerminalContext {
    pub privileged: bool,
}

impl TerminalContext {
    /// Full rights: the interactive operator console.
    pub fn privileged() -> Self {
        Self { privileged: true }
    }

    /// Read-only rights.
    pub fn restricted() -> Self {
        Self { privileged: false }
    }
}

/// One registered terminal command
pub struct TerminalCommand {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub privileged: bool,
    handler: Handler,
}

/// The static command table
pub struct TerminalRegistry {
    commands: BTreeMap<&'static str, TerminalCommand>,
}

impl TerminalRegistry {
    /// Registry with the built-in governor commands
    pub fn builtin() -> Self {
        let mut registry = Self {
            commands: BTreeMap::new(),
        };

        registry.register(TerminalCommand {
            name: "list",
            usage: "list",
            help: "List hosted application names",
            privileged: false,
            handler: cmd_list,
        });
        registry.register(TerminalCommand {
            name: "status",
            usage: "status",
            help: "Show per-application state",
            privileged: false,
            handler: cmd_status,
        });
        registry.register(TerminalCommand {
            name: "start",
            usage: "start <app>",
            help: "Start one hosted application",
            privileged: true,
            handler: cmd_start,
        });
        registry.register(TerminalCommand {
            name: "stop",
            usage: "stop <app>",
            help: "Stop one hosted application",
            privileged: true,
            handler: cmd_stop,
        });
        registry.register(TerminalCommand {
            name: "start-all",
            usage: "start-all",
            help: "Start every hosted application",
            privileged: true,
            handler: cmd_start_all,
        });
        registry.register(TerminalCommand {
            name: "stop-all",
            usage: "stop-all",
            help: "Stop every hosted application",
            privileged: true,
            handler: cmd_stop_all,
        });

        registry
    }

    pub fn register(&mut self, command: TerminalCommand) {
        self.commands.insert(command.name, command);
    }

    /// Execute one command line under the given privilege context
    pub async fn execute(
        &self,
        governor: &Governor,
        ctx: &TerminalContext,
        line: &str,
    ) -> Result<String> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(String::new());
        };
        let args: Vec<String> = words.map(str::to_string).collect();

        if name == "help" {
            return Ok(self.help_text());
        }

        let command = self
            .commands
            .get(name)
            .ok_or_else(|| GovernError::terminal(format!("unknown command: {name}")))?;

        if command.privileged && !ctx.privileged {
            return Err(GovernError::permission(format!(
                "command '{}' requires a privileged terminal",
                command.name
            )));
        }

        (command.handler)(governor, args).await
    }

    fn help_text(&self) -> String {
        let mut out = String::from("commands:\n  help\n");
        for command in self.commands.values() {
            out.push_str(&format!("  {:<18} {}\n", command.usage, command.help));
        }
        out
    }
}

fn cmd_list(governor: &Governor, _args: Vec<String>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let names = governor.names();
        if names.is_empty() {
            return Ok("no applications configured".into());
        }
        Ok(names
            .iter()
            .map(|n| n.as_str().to_string())
            .collect::<Vec<_>>()
            .join("\n"))
    })
}

fn cmd_status(governor: &Governor, _args: Vec<String>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let statuses = governor.status().await;
        if statuses.is_empty() {
            return Ok("no applications configured".into());
        }
        let mut out = String::new();
        for s in statuses {
            let state = if s.running { "running" } else { "stopped" };
            let connected = if s.connected { "connected" } else { "-" };
            let last = s
                .last_start_attempt
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".into());
            out.push_str(&format!(
                "{:<20} {:<8} {:<10} last-start={}",
                s.name, state, connected, last
            ));
            if let Some(reason) = s.failure_reason {
                out.push_str(&format!(" failure={reason}"));
            }
            out.push('\n');
        }
        Ok(out)
    })
}

fn one_app_arg(args: &[String], usage: &str) -> Result<AppName> {
    match args {
        [name] => Ok(AppName::new(name.clone())),
        _ => Err(GovernError::terminal(format!("usage: {usage}"))),
    }
}

fn cmd_start(governor: &Governor, args: Vec<String>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let name = one_app_arg(&args, "start <app>")?;
        let outcome = governor.start(&name).await?;
        if outcome.started {
            match outcome.warning {
                Some(w) => Ok(format!("{name}: start reported, with warning: {w}")),
                None => Ok(format!("{name}: started")),
            }
        } else {
            let app = governor.app(&name);
            let reason = match app {
                Some(app) => app
                    .lock()
                    .await
                    .failure_reason()
                    .unwrap_or("already running")
                    .to_string(),
                None => "unknown".into(),
            };
            Ok(format!("{name}: not started ({reason})"))
        }
    })
}

fn cmd_stop(governor: &Governor, args: Vec<String>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let name = one_app_arg(&args, "stop <app>")?;
        let outcome = governor.stop(&name).await?;
        if outcome.stopped {
            if outcome.forced {
                Ok(format!("{name}: stopped (forced kill)"))
            } else {
                Ok(format!("{name}: stopped"))
            }
        } else {
            Ok(format!("{name}: already stopped"))
        }
    })
}

fn cmd_start_all(governor: &Governor, _args: Vec<String>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let outcome = governor.start_all().await;
        Ok(format!(
            "started={} skipped={} failed={}",
            outcome.succeeded, outcome.skipped, outcome.failed
        ))
    })
}

fn cmd_stop_all(governor: &Governor, _args: Vec<String>) -> HandlerFuture<'_> {
    Box::pin(async move {
        let outcome = governor.stop_all().await;
        Ok(format!(
            "stopped={} skipped={}",
            outcome.succeeded, outcome.skipped
        ))
    })
}
