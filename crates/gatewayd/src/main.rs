//! gatewayd entry point.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use gateway_config::{defaults, ConfigPublisher, JsonSessionPolicyParser, Loader};
use gateway_control::{PublishingConfig, RouteSources};
use gatewayd::Gateway;
use tokio::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Gateway control daemon
#[derive(Parser, Debug)]
#[command(name = "gatewayd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Session policies file
    #[arg(long, default_value = defaults::DEFAULT_SESSION_POLICIES_FILE)]
    session_policies: PathBuf,

    /// Routing policy file; a missing file at the default path rejects all prefixes
    #[arg(long, default_value = defaults::DEFAULT_ROUTING_POLICY_FILE)]
    routing_policy: PathBuf,

    /// Source address of published IPv4 routes
    #[arg(long)]
    source_v4: Ipv4Addr,

    /// Source address of published IPv6 routes
    #[arg(long)]
    source_v6: Ipv6Addr,

    /// Next hop of published routes
    #[arg(long)]
    next_hop: Option<IpAddr>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).context("invalid log level")?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .init();
    Ok(())
}

/// Turns SIGHUP into reload triggers until cancelled.
fn spawn_reload_on_hangup(
    trigger: mpsc::Sender<()>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut hangup = signal::unix::signal(SignalKind::hangup()).context("installing SIGHUP handler")?;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!("Received SIGHUP, reloading configuration");
                    // A full channel already holds a pending reload.
                    if let Err(mpsc::error::TrySendError::Closed(())) = trigger.try_send(()) {
                        break;
                    }
                }
            }
        }
    });
    Ok(())
}

fn spawn_shutdown_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received SIGINT, shutting down");
            cancel.cancel();
        }
    });
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = PublishingConfig::new(RouteSources::new(args.source_v4, args.source_v6));
    if let Some(next_hop) = args.next_hop {
        config = config.with_next_hop(next_hop);
    }
    info!(
        source_v4 = %args.source_v4,
        source_v6 = %args.source_v6,
        next_hop = ?args.next_hop,
        "Publishing configuration"
    );

    let gateway = Arc::new(Gateway::new(config));
    let (trigger, trigger_rx) = mpsc::channel(1);
    let loader = Loader::builder()
        .session_policies_file(&args.session_policies)
        .routing_policy_file(&args.routing_policy)
        .publisher(Arc::clone(&gateway) as Arc<dyn ConfigPublisher>)
        .trigger(trigger_rx)
        .parser(Arc::new(JsonSessionPolicyParser))
        .build()
        .context("building configuration loader")?;

    let cancel = CancellationToken::new();
    spawn_shutdown_on_ctrl_c(cancel.clone());
    spawn_reload_on_hangup(trigger.clone(), cancel.clone())?;

    // Initial load.
    trigger.try_send(()).context("triggering initial load")?;

    loader.run(cancel).await?;

    if let Some(diagnostics) = gateway.diagnostics() {
        debug!(
            state = %serde_json::to_string(&diagnostics)?,
            "Final routing table state"
        );
    }
    gateway.close()?;
    info!("Shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("gatewayd: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("--- Starting gatewayd ---");
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "gatewayd failed");
            ExitCode::FAILURE
        }
    }
}
