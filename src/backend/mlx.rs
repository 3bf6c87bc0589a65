//! Deterministic stand-in for the `mlx` engine family.
//!
//! The real MLX backend (Apple Silicon, unified-memory weights) is out of
//! scope; this implementation satisfies the [`Backend`](super::Backend)
//! contract so the scheduler and swap protocol can be exercised end-to-end.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::registry::{EngineCapabilities, ModelSpec};

use super::{Backend, BackendError, TranscribeOptions, TranscriptionOutcome, SIMULATED_IO_LATENCY};

#[derive(Debug)]
pub struct MlxBackend {
    spec: ModelSpec,
    loaded: bool,
}

impl MlxBackend {
    pub fn new(spec: ModelSpec) -> Self {
        Self {
            spec,
            loaded: false,
        }
    }
}

#[async_trait]
impl Backend for MlxBackend {
    async fn load(&mut self) -> Result<(), BackendError> {
        if self.loaded {
            debug!(alias = %self.spec.alias, "mlx backend already loaded, load is a no-op");
            return Ok(());
        }
        tokio::time::sleep(SIMULATED_IO_LATENCY).await;
        debug!(alias = %self.spec.alias, model_id = %self.spec.model_id, "mlx backend loaded");
        self.loaded = true;
        Ok(())
    }

    async fn release(&mut self) -> Result<(), BackendError> {
        if !self.loaded {
            return Ok(());
        }
        tokio::time::sleep(SIMULATED_IO_LATENCY).await;
        debug!(alias = %self.spec.alias, "mlx backend released");
        self.loaded = false;
        Ok(())
    }

    async fn transcribe(
        &mut self,
        path: &Path,
        options: &TranscribeOptions,
    ) -> Result<TranscriptionOutcome, BackendError> {
        if !self.loaded {
            return Err(BackendError::NotLoaded);
        }
        super::simulate_transcription(path, options, self.capabilities())
    }

    fn capabilities(&self) -> EngineCapabilities {
        self.spec.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelRegistry;

    fn spec() -> ModelSpec {
        ModelRegistry::with_builtins().lookup("qwen3-asr").unwrap()
    }

    #[tokio::test]
    async fn load_then_transcribe_reports_capabilities() {
        let mut backend = MlxBackend::new(spec());
        backend.load().await.unwrap();
        assert!(backend.capabilities().language_detect);

        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), vec![0u8; 32_000]).unwrap();

        let outcome = backend
            .transcribe(
                tmp.path(),
                &TranscribeOptions {
                    language: None,
                    with_timestamp: true,
                },
            )
            .await
            .unwrap();
        assert!(outcome.segments.is_some());
    }
}
