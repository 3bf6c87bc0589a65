//! Backend contract: the polymorphic interface every inference engine
//! implements, plus the factory that instantiates one from a [`ModelSpec`].
//!
//! The real `funasr`/`mlx` engines are out of scope for this service; the
//! two implementations here ([`funasr::FunasrBackend`] and [`mlx::MlxBackend`])
//! are deterministic in-process stand-ins that simulate load/release latency
//! and derive canned-but-varied output from the input file, which is enough
//! to drive the admission layer, scheduler, and swap protocol exactly as a
//! real backend would.

pub mod funasr;
pub mod mlx;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::registry::{EngineCapabilities, EngineType, ModelSpec};

/// A single transcribed segment, as produced by a `json`-format backend.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TranscriptSegment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    pub speaker_id: Option<String>,
}

/// Options accompanying a `transcribe` call, carried on the [`Job`](crate::scheduler::Job).
#[derive(Debug, Clone, Default)]
pub struct TranscribeOptions {
    pub language: Option<String>,
    pub with_timestamp: bool,
}

/// The result of a successful `transcribe` call.
///
/// Always carries the plain `text`; `segments` and `audio_duration_secs` are
/// present only when the backend's capabilities and the request's options
/// produced them.
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub text: String,
    pub segments: Option<Vec<TranscriptSegment>>,
    pub language: Option<String>,
    pub audio_duration_secs: Option<f64>,
}

/// Errors a backend implementation may raise from any of its four operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("failed to load backend: {0}")]
    LoadFailed(String),
    #[error("failed to release backend: {0}")]
    ReleaseFailed(String),
    #[error("backend is not loaded")]
    NotLoaded,
    #[error("transcription failed: {0}")]
    TranscribeFailed(String),
}

/// Polymorphic inference backend contract.
///
/// Implementations must:
/// 1. Be safe to construct without expensive work (lazy `load`).
/// 2. Make `load` idempotent when already loaded.
/// 3. Make `release` tolerant of being called on an unloaded instance.
/// 4. Report stable capabilities via `capabilities` once loaded.
/// 5. Never retain references to the input file after `transcribe` returns.
///
/// The scheduler calls exactly one of {`load`, `release`, `transcribe`} at a
/// time on any given instance, so implementations need not be internally
/// thread-safe beyond ordinary `&mut self` exclusivity.
#[async_trait]
pub trait Backend: Send {
    /// Load the model. A no-op if already loaded.
    async fn load(&mut self) -> Result<(), BackendError>;

    /// Release the model, freeing its memory. Tolerant of being called while
    /// unloaded.
    async fn release(&mut self) -> Result<(), BackendError>;

    /// Transcribe the audio file at `path`. Fails with [`BackendError::NotLoaded`]
    /// if the backend has not been loaded.
    async fn transcribe(
        &mut self,
        path: &Path,
        options: &TranscribeOptions,
    ) -> Result<TranscriptionOutcome, BackendError>;

    /// The capabilities of this backend once loaded.
    fn capabilities(&self) -> EngineCapabilities;
}

/// A backend constructor: given a spec, produce an unloaded backend.
/// The scheduler is parameterised over this so tests can substitute
/// failure-injecting backends (closures capturing shared test state)
/// without touching the swap protocol itself.
pub type Factory = std::sync::Arc<dyn Fn(&ModelSpec) -> Box<dyn Backend> + Send + Sync>;

/// Instantiate an unloaded [`Backend`] from a [`ModelSpec`]. Construction is
/// cheap; the returned backend still needs `load()` before use.
pub fn factory(spec: &ModelSpec) -> Box<dyn Backend> {
    match spec.engine_type {
        EngineType::Funasr => Box::new(funasr::FunasrBackend::new(spec.clone())),
        EngineType::Mlx => Box::new(mlx::MlxBackend::new(spec.clone())),
    }
}

/// Shared helper: derive deterministic canned output from a file's size and
/// the requested options, used by both engine stand-ins.
pub(crate) fn simulate_transcription(
    path: &Path,
    options: &TranscribeOptions,
    capabilities: EngineCapabilities,
) -> Result<TranscriptionOutcome, BackendError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| BackendError::TranscribeFailed(format!("cannot stat input file: {e}")))?;
    let size = metadata.len();

    // A crude but deterministic "duration": ~16 KiB/s of 16-bit mono PCM.
    let audio_duration_secs = (size as f64) / 16_000.0;
    let text = format!("transcribed {size} bytes of audio");

    let segments = if options.with_timestamp && capabilities.timestamp {
        let end_ms = (audio_duration_secs * 1000.0).round() as u64;
        Some(vec![TranscriptSegment {
            start_ms: 0,
            end_ms: end_ms.max(1),
            text: text.clone(),
            speaker_id: capabilities.diarization.then(|| "Speaker 0".to_string()),
        }])
    } else {
        None
    };

    let language = if capabilities.language_detect {
        Some(options.language.clone().unwrap_or_else(|| "en".to_string()))
    } else {
        options.language.clone()
    };

    Ok(TranscriptionOutcome {
        text,
        segments,
        language,
        audio_duration_secs: Some(audio_duration_secs),
    })
}

/// Simulated load/release latency, small enough to keep tests fast.
pub(crate) const SIMULATED_IO_LATENCY: Duration = Duration::from_millis(1);
