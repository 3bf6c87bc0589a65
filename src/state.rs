//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::config::Config;
use crate::registry::ModelRegistry;
use crate::scheduler::Scheduler;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Process-wide, read-only model table.
    pub registry: Arc<ModelRegistry>,
    /// Handle to the bounded-queue scheduler.
    pub scheduler: Scheduler,
}
