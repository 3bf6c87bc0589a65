//! Axum router construction.
//!
//! [`build`] assembles the complete application router: CORS and
//! correlation-id middleware, the liveness route, the model-registry
//! introspection routes, and the transcription endpoint.

mod audio;
mod health;
mod models;

use axum::Router;
use axum::extract::DefaultBodyLimit;

use crate::middleware::{TraceLayer, cors::cors_layer};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(health::router())
        .merge(models::router())
        .merge(audio::router())
        // Axum's default 2 MiB request-body limit would otherwise reject
        // uploads well under `MAX_UPLOAD_SIZE_MB` before admission's own
        // size check (`admission::check_size`) ever runs. Disabling it here
        // makes that check the sole authority, so oversize uploads get the
        // spec-mandated 413 `PayloadTooLarge` instead of axum's generic
        // body-too-large rejection.
        .layer(DefaultBodyLimit::disable())
        // Outermost layers execute first on the way in.
        .layer(TraceLayer::new())
        .layer(cors)
        .with_state(state)
}
