//! governd - process-governance host
//!
//! One binary, two process-body flavors:
//! - interactive: operator console dispatching remote-terminal commands
//! - governed: headless child of another governor, stopped over the
//!   control channel, with crash-file persistence as the last resort
//!
//! Exit codes for the governed flavor: 0 on clean stop, -100 on any
//! uncaught top-level error.

mod crash;
mod daemon;
mod host;

use anyhow::{Context, Result};
use clap::Parser;
use crash::{CrashReport, TracePoint, CLEAN_EXIT_CODE, CRASH_EXIT_CODE};
use govern_config::load_config;
use govern_ipc::BindingUri;
use host::{run_governed, run_interactive, BootArgs, HostContext};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// governd - governor and host for subordinate application processes
#[derive(Parser, Debug)]
#[command(name = "governd")]
#[command(about = "Process governor: boots, supervises, and stops subordinate applications", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "governd.toml")]
    config: PathBuf,

    /// Binding URI of a governing parent. Presence selects the governed
    /// (headless) flavor; injected by the parent via pragma substitution.
    #[arg(long, env = "GOVERND_GOVERNED_URI")]
    governed: Option<String>,

    /// Application id used in crash-file names
    #[arg(long, env = "GOVERND_APP_ID")]
    app_id: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        governed = args.governed.is_some(),
        "governd starting"
    );

    let code = if args.governed.is_some() {
        governed_entry(&args).await
    } else {
        match interactive_entry(&args).await {
            Ok(()) => CLEAN_EXIT_CODE,
            Err(e) => {
                eprintln!("governd: {e:#}");
                1
            }
        }
    };

    std::process::exit(code);
}

/// Interactive flavor: errors surface on the console
async fn interactive_entry(args: &Args) -> Result<()> {
    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let mut ctx = HostContext::start(BootArgs {
        config,
        governed_uri: None,
        app_id: args.app_id.clone(),
    })
    .await?;

    let result = run_interactive(&ctx).await;

    ctx.stop().await;

    result
}

/// Governed flavor: any error escaping this path becomes a crash file and
/// a distinguishable exit code
async fn governed_entry(args: &Args) -> i32 {
    let trace = TracePoint::new("boot");

    match governed_body(args, &trace).await {
        Ok(()) => CLEAN_EXIT_CODE,
        Err(error) => {
            let report = CrashReport::new(
                env!("CARGO_PKG_NAME"),
                trace.get(),
                args.app_id.clone(),
                error,
            );

            match report.persist(&govern_util::now_utc()) {
                Ok(path) => {
                    // Console echo is best-effort; a secondary failure here
                    // must not mask the exit code
                    let _ = write_stderr(&format!(
                        "{}crash file: {}\n",
                        report.render(),
                        path.display()
                    ));
                }
                Err(e) => {
                    let _ = write_stderr(&format!(
                        "{}crash file could not be written: {}\n",
                        report.render(),
                        e
                    ));
                }
            }

            CRASH_EXIT_CODE
        }
    }
}

async fn governed_body(args: &Args, trace: &TracePoint) -> Result<()> {
    trace.set("load-config");
    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    trace.set("parse-binding-uri");
    let governed_uri = match &args.governed {
        Some(raw) => Some(
            BindingUri::parse(raw)
                .with_context(|| format!("Bad governed URI: {raw}"))?,
        ),
        None => None,
    };

    trace.set("host-start");
    let mut ctx = HostContext::start(BootArgs {
        config,
        governed_uri,
        app_id: args.app_id.clone(),
    })
    .await?;

    trace.set("wait-for-stop");
    let result = run_governed(&ctx).await;

    trace.set("host-stop");
    ctx.stop().await;

    result
}

fn write_stderr(content: &str) -> std::io::Result<()> {
    use std::io::Write;
    std::io::stderr().write_all(content.as_bytes())
}
