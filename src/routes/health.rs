//! Liveness endpoint.

use axum::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{Value, json};

use crate::state::AppState;

/// Register the health route. Deliberately independent of scheduler
/// state: liveness is reported even while the scheduler is degraded.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(get_health))
}

async fn get_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_response_has_ok_status() {
        let Json(body) = get_health().await;
        assert_eq!(body["status"], "ok");
    }
}
