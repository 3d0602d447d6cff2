//! Platform entry point.

use app::{Config, Platform};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics exporter
    let metrics_addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("failed to install Prometheus exporter");
    tracing::info!(%metrics_addr, "metrics exporter listening");

    // 3. Wire the broker and the services
    let platform = Platform::start(&config).expect("failed to start platform");
    tracing::info!(
        min_charge = %config.min_charge(),
        workers = config.broker_workers,
        "platform started"
    );

    // 4. Surface reservation records left over from before the last
    //    shutdown; delivered orders keep theirs, so review before
    //    restoring any stock
    let unreleased = platform.inventory.recover().await;
    if !unreleased.is_empty() {
        tracing::warn!(count = unreleased.len(), "unreleased reservations need review");
    }

    shutdown_signal().await;
    tracing::info!("platform shut down gracefully");
}
