//! asr-scheduler -- entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing.
//! 3. Build the model registry and resolve the startup spec.
//! 4. Start the scheduler worker with the startup backend loaded.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod admission;
mod backend;
mod config;
mod error;
mod format;
mod middleware;
mod registry;
mod routes;
mod scheduler;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::registry::ModelRegistry;
use crate::scheduler::Scheduler;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -- 1. Configuration --------------------------------------------------
    let cfg = Config::from_env()?;

    // -- 2. Tracing ----------------------------------------------------------
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: LOG_LEVEL='{}' is not a valid tracing filter ({e}); falling back to 'info'",
                    cfg.log_level
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "asr-scheduler starting");

    // -- 3. Model registry and startup spec -----------------------------------
    let registry = Arc::new(ModelRegistry::with_builtins());
    let initial_spec = registry
        .lookup(&cfg.model_id)
        .unwrap_or_else(|_| ModelRegistry::spec_for_startup(cfg.engine_type, &cfg.model_id));
    info!(alias = %initial_spec.alias, engine_type = %initial_spec.engine_type, "resolved startup model");

    // -- 4. Scheduler ----------------------------------------------------------
    let (scheduler, worker_join) = Scheduler::spawn(initial_spec, cfg.max_queue_size)
        .await
        .map_err(|e| anyhow::anyhow!("failed to start scheduler: {e}"))?;
    info!(capacity = cfg.max_queue_size, "scheduler worker started");

    // -- 5. HTTP server with graceful shutdown ----------------------------------
    let state = AppState {
        config: Arc::new(cfg.clone()),
        registry,
        scheduler: scheduler.clone(),
    };

    let app = routes::build(state);
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    if let Err(e) = worker_join.await {
        warn!(error = %e, "scheduler worker task panicked during shutdown");
    }

    info!("asr-scheduler stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
