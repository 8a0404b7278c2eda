mod cli;
mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{bail, WrapErr};
use tokio::sync::watch;

use basemon_core::block::BlockInspector;
use basemon_core::host::systemd::SystemctlProbe;
use basemon_core::host::{HostCollector, HostConfig};
use basemon_core::rpc::{find_in_path, CliTransport, HttpTransport, RpcClient, RpcTransport};
use basemon_core::{MetricRegistry, PollConfig, Poller};

/// Upper bound for a single `systemctl is-active` probe.
const UNIT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let registry = Arc::new(MetricRegistry::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Configuration errors surface here, before anything is served.
    let (bind, port, worker) = match args.command {
        cli::Command::Bitcoind(cmd) => {
            let poller = build_poller(&cmd, registry.clone())?;
            let worker = tokio::spawn(poller.run(stopped(shutdown_rx)));
            (cmd.bind, cmd.port, worker)
        }
        cli::Command::Host(cmd) => {
            let collector = build_host_collector(&cmd, registry.clone())?;
            let worker = tokio::spawn(collector.run(stopped(shutdown_rx)));
            (cmd.bind, cmd.port, worker)
        }
    };

    let bind_addr = format!("{bind}:{port}");
    if bind == "0.0.0.0" {
        tracing::warn!("metrics endpoint is bound to 0.0.0.0 and is accessible from the network");
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;
    let router = server::build_router(server::AppState { registry });

    tracing::info!("serving metrics on http://{bind_addr}/metrics");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("run HTTP server")?;

    worker.await.context("join collector task")?;
    Ok(())
}

fn build_poller(cmd: &cli::BitcoindArgs, registry: Arc<MetricRegistry>) -> eyre::Result<Poller> {
    if cmd.rpc_timeout == 0 {
        bail!("--rpc-timeout must be at least 1 second");
    }
    let timeout = Duration::from_secs(cmd.rpc_timeout);

    let transport: Arc<dyn RpcTransport> = match &cmd.rpc_url {
        Some(url) => {
            tracing::info!(url = %url, "using JSON-RPC over HTTP");
            Arc::new(
                HttpTransport::new(
                    url,
                    cmd.rpc_user.as_deref(),
                    cmd.rpc_pass.as_deref(),
                    cmd.rpc_cookie_file.as_deref(),
                    timeout,
                )
                .context("configure bitcoind HTTP RPC")?,
            )
        }
        None => {
            let program = find_in_path(&cmd.bitcoin_cli).context("locate bitcoin-cli")?;
            let conf = (!cmd.bitcoin_conf.is_empty()).then(|| PathBuf::from(&cmd.bitcoin_conf));
            tracing::info!(program = %program.display(), "using bitcoin-cli");
            Arc::new(CliTransport::new(program, conf.as_deref(), timeout))
        }
    };

    if cmd.txindex {
        tracing::info!("detailed block accounting enabled; bitcoind must run with txindex=1");
    }

    let rpc = RpcClient::new(transport);
    let config = PollConfig {
        slow_interval: Duration::from_secs(cmd.slow_interval),
        fast_interval: Duration::from_secs(cmd.fast_interval),
    };
    Poller::new(
        rpc.clone(),
        BlockInspector::new(rpc, cmd.txindex),
        registry,
        config,
    )
    .context("configure bitcoind poller")
}

fn build_host_collector(
    cmd: &cli::HostArgs,
    registry: Arc<MetricRegistry>,
) -> eyre::Result<HostCollector> {
    let config = HostConfig {
        interval: Duration::from_secs(cmd.interval),
        sysconfig_dir: cmd.sysconfig_dir.clone(),
        cpu_temp_path: cmd.cpu_temp_path.clone(),
        fan_speed_path: cmd.fan_speed_path.clone(),
        units: cmd.units.clone(),
    };
    HostCollector::new(
        config,
        Arc::new(SystemctlProbe::new(UNIT_PROBE_TIMEOUT)),
        registry,
    )
    .context("configure host collector")
}

/// Resolves once the shutdown flag is raised (or its sender is gone).
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Listens for OS shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
