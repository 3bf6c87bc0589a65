//! Server configuration, loaded from environment variables at startup.

use crate::registry::EngineType;

/// Runtime configuration for the scheduler service.
///
/// Every field has a sensible default so the service works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`, from `HOST`/`PORT`).
    pub bind_address: String,

    /// Bounded FIFO capacity `Q` (default 50).
    pub max_queue_size: usize,

    /// Admission size limit in bytes (default 200 MiB).
    pub max_upload_size_bytes: u64,

    /// Comma-separated list of allowed CORS origins, e.g.
    /// `"https://app.example.com,https://admin.example.com"`.
    /// `*` (the default) allows any origin.
    pub allowed_origins: String,

    /// Startup backend kind.
    pub engine_type: EngineType,

    /// Startup `model_id`, or an alias resolvable by the registry.
    pub model_id: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = parse_env("PORT", 8000)?;

        Ok(Self {
            bind_address: format!("{host}:{port}"),
            max_queue_size: parse_env("MAX_QUEUE_SIZE", 50)?,
            max_upload_size_bytes: parse_env::<u64>("MAX_UPLOAD_SIZE_MB", 200)? * 1024 * 1024,
            allowed_origins: env_or("ALLOWED_ORIGINS", "*"),
            engine_type: std::env::var("ENGINE_TYPE")
                .ok()
                .map(|v| v.parse::<EngineType>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("ENGINE_TYPE must be 'funasr' or 'mlx'"))?
                .unwrap_or(EngineType::Funasr),
            model_id: env_or("MODEL_ID", "qwen3-asr"),
            log_level: env_or("LOG_LEVEL", "info"),
        })
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| anyhow::anyhow!("{key}='{v}' is not a valid value")),
        Err(_) => Ok(default),
    }
}
