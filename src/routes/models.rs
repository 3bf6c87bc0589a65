//! Model registry and current-backend introspection routes.

use axum::Json;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde_json::{Value, json};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/models", get(list_models))
        .route("/v1/models/current", get(current_model))
}

/// `GET /v1/models` — the registry snapshot plus the currently loaded alias.
async fn list_models(State(state): State<AppState>) -> Json<Value> {
    let current = state.scheduler.current_snapshot().await;
    let data: Vec<Value> = state
        .registry
        .list_all()
        .into_iter()
        .map(|spec| {
            json!({
                "id": spec.alias,
                "object": "model",
                "model_id": spec.model_id,
                "engine_type": spec.engine_type.to_string(),
                "capabilities": spec.capabilities,
                "current": spec.alias == current.alias,
            })
        })
        .collect();

    Json(json!({
        "object": "list",
        "data": data,
        "current": current.alias,
    }))
}

/// `GET /v1/models/current` — reads the currently loaded spec, not the live
/// backend's reported capabilities, to avoid a read-during-swap race.
async fn current_model(State(state): State<AppState>) -> Json<Value> {
    let current = state.scheduler.current_snapshot().await;
    Json(json!({
        "alias": current.alias,
        "model_id": current.model_id,
        "engine_type": current.engine_type.to_string(),
        "capabilities": current.capabilities,
        "queue_depth": state.scheduler.queue_depth(),
        "queue_capacity": state.scheduler.queue_capacity(),
        "degraded": state.scheduler.is_degraded(),
    }))
}
