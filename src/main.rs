//! memvol
//!
//! Runs the tmpfs CSI plugin and the node-local volume query agent.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           memvol                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CSI socket ──▶ MemoryDriver ──▶ tmpfs mounts               │
//! │  Query socket ──▶ QueryService ──▶ runtime records          │
//! │  Metrics addr ──▶ /metrics /healthz /readyz                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use kube::Client;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use memvol::adapters::{KubeCapacityLookup, SystemMounter};
use memvol::agent::{QueryRouter, QueryService, QueryServiceConfig, DEFAULT_QUERY_SOCKET};
use memvol::csi::{CsiRouter, DriverConfig, MemoryDriver, DEFAULT_DRIVER_NAME};
use memvol::error::{Error, Result};
use memvol::logs::{Component, LogStatus};
use memvol::metrics::run_metrics_server;
use memvol::server::{bind_unix_socket, serve_unix, unix_socket_path};
use memvol::volume::VolumeLifecycleManager;

// =============================================================================
// CLI Arguments
// =============================================================================

/// memvol - tmpfs-backed ephemeral CSI volumes and volume info agent
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSI driver name
    #[arg(long, env = "DRIVER_NAME", default_value = DEFAULT_DRIVER_NAME)]
    driver_name: String,

    /// Node ID reported by NodeGetInfo (defaults to the host name)
    #[arg(long, env = "KUBE_NODE_NAME")]
    node_id: Option<String>,

    /// CSI plugin endpoint
    #[arg(
        long,
        env = "CSI_ENDPOINT",
        default_value = "unix:///var/lib/kubelet/plugins/mem.csi.memvol.io/csi.sock"
    )]
    csi_endpoint: String,

    /// Volume query socket path
    #[arg(long, env = "QUERY_SOCKET", default_value = DEFAULT_QUERY_SOCKET)]
    query_socket: String,

    /// File name of the runtime record inside each volume directory
    #[arg(
        long,
        env = "RUNTIME_FILE_NAME",
        default_value = memvol::agent::DEFAULT_RUNTIME_FILE_NAME
    )]
    runtime_file_name: String,

    /// Do not serve the CSI plugin socket
    #[arg(long, env = "DISABLE_CSI")]
    disable_csi: bool,

    /// Do not serve the volume query socket
    #[arg(long, env = "DISABLE_QUERY_SERVER")]
    disable_query_server: bool,

    /// Metrics server bind address (disabled when unset)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    info!("Starting memvol");
    info!("  Driver name: {}", args.driver_name);
    info!("  CSI endpoint: {}", args.csi_endpoint);
    info!("  Query socket: {}", args.query_socket);
    info!("  CSI enabled: {}", !args.disable_csi);
    info!("  Query server enabled: {}", !args.disable_query_server);

    if args.disable_csi && args.disable_query_server {
        return Err(Error::Config(
            "both the CSI plugin and the query server are disabled".to_string(),
        ));
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    if let Some(addr) = args.metrics_addr.clone() {
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(&addr, token).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let mut servers: JoinSet<Result<()>> = JoinSet::new();

    if !args.disable_query_server {
        let service = QueryService::new(QueryServiceConfig {
            runtime_file_name: args.runtime_file_name.clone(),
        });
        let listener = bind_socket(&args.query_socket).await?;
        info!(component = %Component::Agent, "Started query server on {}", args.query_socket);
        servers.spawn(serve_unix(
            listener,
            Arc::new(QueryRouter::new(service)),
            shutdown.clone(),
        ));
    }

    if !args.disable_csi {
        let client = Client::try_default().await.map_err(|e| {
            error!(
                component = %Component::Mem,
                status = %LogStatus::GetKubeConfigFailed,
                reason = LogStatus::GetKubeConfigFailed.reason(),
                detail = LogStatus::GetKubeConfigFailed.message(),
                recommend = LogStatus::GetKubeConfigFailed.recommend(),
                "Failed to create Kubernetes client: {}",
                e
            );
            Error::Internal(format!("Kubernetes client creation failed: {}", e))
        })?;
        info!("Connected to Kubernetes cluster");

        let config = DriverConfig {
            name: args.driver_name.clone(),
            node_id: resolve_node_id(args.node_id.clone())?,
            ..Default::default()
        };
        info!("  Node ID: {}", config.node_id);

        let lifecycle = VolumeLifecycleManager::new(
            Arc::new(KubeCapacityLookup::new(client)),
            Arc::new(SystemMounter::new()),
        );
        let driver = Arc::new(MemoryDriver::new(config, lifecycle));

        let listener = bind_socket(unix_socket_path(&args.csi_endpoint)?).await?;
        info!(component = %Component::Mem, "Started CSI plugin on {}", args.csi_endpoint);
        servers.spawn(serve_unix(listener, Arc::new(CsiRouter::new(driver)), shutdown.clone()));
    }

    let mut outcome = Ok(());
    while let Some(joined) = servers.join_next().await {
        let result = joined.map_err(|e| Error::Internal(format!("server task failed: {}", e)));
        if let Err(e) = result.and_then(|served| served) {
            error!(
                status = %LogStatus::SocketError,
                reason = LogStatus::SocketError.reason(),
                "Server stopped: {}",
                e
            );
            shutdown.cancel();
            if outcome.is_ok() {
                outcome = Err(e);
            }
        }
    }

    info!("memvol shutdown complete");
    outcome
}

async fn bind_socket(path: &str) -> Result<tokio::net::UnixListener> {
    bind_unix_socket(Path::new(path)).await.inspect_err(|e| {
        error!(
            status = %LogStatus::SocketError,
            reason = LogStatus::SocketError.reason(),
            detail = LogStatus::SocketError.message(),
            recommend = LogStatus::SocketError.recommend(),
            "Socket {} listen failed: {}",
            path,
            e
        );
    })
}

fn resolve_node_id(flag: Option<String>) -> Result<String> {
    match flag.filter(|id| !id.is_empty()) {
        Some(id) => Ok(id),
        None => nix::unistd::gethostname()
            .map_err(|e| Error::Config(format!("cannot determine node id: {}", e)))?
            .into_string()
            .map_err(|raw| Error::Config(format!("host name is not UTF-8: {:?}", raw))),
    }
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
    shutdown.cancel();
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = ["hyper=warn", "kube=info", "tower=warn"]
        .iter()
        .filter_map(|directive| directive.parse::<Directive>().ok())
        .fold(
            EnvFilter::from_default_env().add_directive(level.into()),
            EnvFilter::add_directive,
        );

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
