use clap::Parser;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use bookgate::config::{EvictionConfig, GovernorConfig};
use bookgate::http::HttpServer;
use bookgate::ratelimit::{Governor, TracingAuditSink};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "bookgate")]
#[command(about = "Request-rate governor for the bookstore storefront")]
#[command(version)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Public listen address (overrides configuration)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Admin listen address (overrides configuration)
    #[arg(long)]
    admin_listen: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }

    info!("Starting Bookgate rate governor");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = GovernorConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.listen {
        config.server.listen_addr = addr;
    }
    if let Some(addr) = args.admin_listen {
        config.server.admin_addr = addr;
    }

    let limits = config.rate_limiting.limits();
    info!(
        listen_addr = %config.server.listen_addr,
        admin_addr = %config.server.admin_addr,
        general = limits.general.max_requests,
        login = limits.login.max_requests,
        register = limits.register.max_requests,
        "Configuration loaded"
    );

    let settings = Arc::new(config.rate_limiting.settings());
    let governor = Arc::new(Governor::new(
        limits,
        settings.clone(),
        Arc::new(TracingAuditSink),
    ));
    info!("Rate governor initialized");

    match config.rate_limiting.eviction {
        Some(eviction) => spawn_eviction(governor.clone(), eviction),
        None => info!("Idle counter eviction disabled, counters are kept for the process lifetime"),
    }

    let server = HttpServer::new(&config.server, governor, settings);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Bookgate rate governor stopped");
    Ok(())
}

/// Periodically drop counters that have been idle past the configured age.
fn spawn_eviction(governor: Arc<Governor>, eviction: EvictionConfig) {
    let idle_for = Duration::from_secs(eviction.idle_secs);
    info!(
        interval_secs = eviction.interval_secs,
        idle_secs = eviction.idle_secs,
        "Idle counter eviction enabled"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(eviction.interval_secs));
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = governor.evict_idle(idle_for);
            debug!(
                evicted,
                tracked = governor.tracked_counters(),
                "Eviction sweep finished"
            );
        }
    });
}

/// Wait for Ctrl+C or SIGTERM. A handler that cannot be installed is
/// logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = first_signal(ctrl_c, terminate).await;
    info!(signal = received, "Initiating graceful shutdown");
}

/// Name of whichever shutdown trigger completes first.
async fn first_signal(
    ctrl_c: impl Future<Output = ()>,
    terminate: impl Future<Output = ()>,
) -> &'static str {
    tokio::select! {
        _ = ctrl_c => "ctrl-c",
        _ = terminate => "sigterm",
    }
}
