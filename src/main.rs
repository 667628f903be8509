//! Cirrhosis risk service — binary entrypoint.
//! Loads config, bootstraps the session, serves the HTTP API and tears the
//! session down on Ctrl-C / SIGTERM.

use anyhow::Context;
use cirrhosis_risk::{config::AppConfig, metrics::Metrics, Service};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cirrhosis_risk=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading configuration")?;
    tracing::info!(?cfg, "configuration loaded");

    // Recorder must exist before anything describes or records series.
    let metrics = if cfg.metrics {
        Some(Metrics::init(cfg.latency_ms)?)
    } else {
        None
    };

    let service = Service::from_config(&cfg);
    let router = service.router(metrics.as_ref());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(addr = %cfg.bind_addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    let last = service.shutdown().await;
    tracing::info!(state = last.as_str(), "shutdown complete");
    Ok(())
}
