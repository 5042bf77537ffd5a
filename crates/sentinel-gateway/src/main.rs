//! Sentinel sidecar binary.
//!
//! Config path: argv[1], then `SENTINEL_CONFIG`, then `sentinel.yaml`.
//! A missing file runs with defaults; `SENTINEL_*` variables override.

use std::path::Path;

use tracing_subscriber::{fmt, EnvFilter};

use sentinel_core::error::Result;
use sentinel_gateway::config::{self, SentinelConfig};
use sentinel_gateway::{app_state, router};

const DEFAULT_CONFIG_PATH: &str = "sentinel.yaml";

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "sentinel failed");
        std::process::exit(1);
    }
}

fn load_config() -> Result<SentinelConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SENTINEL_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let mut cfg = if Path::new(&path).exists() {
        tracing::info!(%path, "loading config");
        config::load_from_file(&path)?
    } else {
        tracing::info!(%path, "config file not found; using defaults");
        SentinelConfig::default()
    };
    cfg.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(cfg)
}

async fn run() -> Result<()> {
    let cfg = load_config()?;
    let listen = cfg.listen_addr()?;

    // Bind first: persistence must only start once it can be closed cleanly.
    let listener = tokio::net::TcpListener::bind(listen).await.map_err(|e| {
        sentinel_core::SentinelError::Internal(format!("bind {listen} failed: {e}"))
    })?;

    let (state, persistence) = app_state::bootstrap(cfg).await?;
    let app = router::build_router(state.clone());
    tracing::info!(%listen, "sentinel listening");

    let drain_state = state.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            drain_state.metrics().set_draining();
            tracing::info!("shutdown requested; draining");
        })
        .await;

    persistence.close().await;

    served.map_err(|e| sentinel_core::SentinelError::Internal(format!("server failed: {e}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
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
