//! Deterministic stand-in for the `funasr` engine family.
//!
//! The real FunASR backend (Python, ONNX/PyTorch weights) is out of scope;
//! this implementation satisfies the [`Backend`](super::Backend) contract so
//! the scheduler and swap protocol can be exercised end-to-end.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::registry::{EngineCapabilities, ModelSpec};

use super::{Backend, BackendError, TranscribeOptions, TranscriptionOutcome, SIMULATED_IO_LATENCY};

#[derive(Debug)]
pub struct FunasrBackend {
    spec: ModelSpec,
    loaded: bool,
}

impl FunasrBackend {
    pub fn new(spec: ModelSpec) -> Self {
        Self {
            spec,
            loaded: false,
        }
    }
}

#[async_trait]
impl Backend for FunasrBackend {
    async fn load(&mut self) -> Result<(), BackendError> {
        if self.loaded {
            debug!(alias = %self.spec.alias, "funasr backend already loaded, load is a no-op");
            return Ok(());
        }
        tokio::time::sleep(SIMULATED_IO_LATENCY).await;
        debug!(alias = %self.spec.alias, model_id = %self.spec.model_id, "funasr backend loaded");
        self.loaded = true;
        Ok(())
    }

    async fn release(&mut self) -> Result<(), BackendError> {
        if !self.loaded {
            return Ok(());
        }
        tokio::time::sleep(SIMULATED_IO_LATENCY).await;
        debug!(alias = %self.spec.alias, "funasr backend released");
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
