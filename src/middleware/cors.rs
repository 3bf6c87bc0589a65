//! CORS layer construction from the configured allow-list.

use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;

/// Build the [`CorsLayer`] from `config.allowed_origins`. `"*"` (the
/// default) allows any origin; otherwise the value is parsed as a
/// comma-separated allow-list.
pub fn cors_layer(config: &Config) -> CorsLayer {
    if config.allowed_origins.trim() == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods(Any);
    }

    let origins: Vec<axum::http::HeaderValue> = config
        .allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods(Any);
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_headers(Any)
        .allow_methods(Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_origins(allowed_origins: &str) -> Config {
        Config {
            bind_address: "0.0.0.0:8000".into(),
            max_queue_size: 1,
            max_upload_size_bytes: 1,
            allowed_origins: allowed_origins.into(),
            engine_type: crate::registry::EngineType::Funasr,
            model_id: "paraformer".into(),
            log_level: "info".into(),
        }
    }

    #[test]
    fn wildcard_builds_without_panicking() {
        let _ = cors_layer(&config_with_origins("*"));
    }

    #[test]
    fn explicit_list_builds_without_panicking() {
        let _ = cors_layer(&config_with_origins(
            "https://a.example.com,https://b.example.com",
        ));
    }

    #[test]
    fn empty_after_filtering_falls_back_to_any() {
        let _ = cors_layer(&config_with_origins(","));
    }
}
