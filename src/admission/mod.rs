//! The admission layer: the entry point of every transcription request.
//!
//! Runs before a [`Job`](crate::scheduler::Job) is enqueued, performing
//! checks in a fixed order with short-circuit failure: MIME/extension type
//! check, size check, model resolution, output-format normalisation,
//! capability gating, scratch materialisation, then enqueue. Re-entrant and
//! fully parallel — only the scheduler's worker loop is single-threaded.

mod upload;

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::backend::TranscribeOptions;
use crate::error::SchedulerError;
use crate::format::{self, OutputFormat};
use crate::registry::{EngineCapabilities, ModelRegistry, ModelSpec};
use crate::scheduler::{JobArgs, JobResult, Scheduler};

/// The raw, not-yet-validated form fields of a transcription request, as
/// parsed off the multipart body by the HTTP surface.
#[derive(Debug, Default)]
pub struct RawRequest {
    pub file_name: String,
    pub declared_content_type: Option<String>,
    pub bytes: Bytes,
    pub model: Option<String>,
    pub language: Option<String>,
    pub output_format: Option<String>,
    pub response_format: Option<String>,
    pub with_timestamp: bool,
}

/// Audio MIME types accepted outright.
const AUDIO_MIME_ALLOWLIST: &[&str] = &[
    "audio/wav",
    "audio/x-wav",
    "audio/wave",
    "audio/mpeg",
    "audio/mp3",
    "audio/mp4",
    "audio/x-m4a",
    "audio/flac",
    "audio/ogg",
    "audio/webm",
    "video/mp4",
    "video/webm",
];

/// MIME types so generic they require an extension fallback check.
const GENERIC_BINARY_MIME: &[&str] = &["application/octet-stream", "binary/octet-stream"];

/// Extensions accepted when the declared MIME type is generic binary.
const ALLOWED_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "mp4", "flac", "ogg", "webm"];

/// Admit a raw request: validate it, materialise the upload to scratch,
/// enqueue it, and await the worker's result. On any failure before step 7,
/// no scratch directory is left behind.
pub async fn admit(
    scheduler: &Scheduler,
    registry: &ModelRegistry,
    max_upload_size_bytes: u64,
    request: RawRequest,
) -> Result<(JobResult, OutputFormat), SchedulerError> {
    // 1. Type check.
    check_media_type(&request)?;

    // 2. Size check.
    check_size(&request, max_upload_size_bytes)?;

    // 3. Model resolution.
    let requested_spec = resolve_model(registry, request.model.as_deref())?;

    // 4. Output-format normalisation.
    let output_format = format::normalize(
        request.output_format.as_deref(),
        request.response_format.as_deref(),
    )?;

    // 5. Capability gating, against the explicit spec if given, else the
    // live backend's capabilities — this lets infeasible requests fail
    // before any swap is incurred.
    let effective_capabilities = match &requested_spec {
        Some(spec) => spec.capabilities,
        None => scheduler.current_snapshot().await.capabilities,
    };
    check_capabilities(output_format, request.with_timestamp, effective_capabilities, &requested_spec)?;

    // 6. Scratch materialisation.
    let uid = Uuid::new_v4();
    let (scratch_dir, input_path) = upload::materialize_upload(uid, &request.file_name, &request.bytes).await?;

    // 7. Enqueue. On a full queue, no scratch was created for rejection
    // cases above, but by this point the directory exists — clean it up if
    // enqueue is rejected.
    let job_args = JobArgs {
        uid,
        scratch_dir: scratch_dir.clone(),
        input_path,
        options: TranscribeOptions {
            language: request.language.clone(),
            // srt output implies timestamps regardless of the request flag.
            with_timestamp: request.with_timestamp || output_format.requires_timestamp(),
        },
        output_format,
        requested_spec,
        received_at: Utc::now(),
    };

    let result_rx = match scheduler.try_enqueue(job_args) {
        Ok(rx) => rx,
        Err(e) => {
            let _ = tokio::fs::remove_dir_all(&scratch_dir).await;
            return Err(e);
        }
    };

    let result = result_rx
        .await
        .map_err(|_| SchedulerError::Internal("worker dropped the result channel".into()))??;

    Ok((result, output_format))
}

fn check_media_type(request: &RawRequest) -> Result<(), SchedulerError> {
    let declared = request
        .declared_content_type
        .as_deref()
        .unwrap_or("application/octet-stream")
        .to_ascii_lowercase();

    if AUDIO_MIME_ALLOWLIST.contains(&declared.as_str()) {
        return Ok(());
    }

    if GENERIC_BINARY_MIME.contains(&declared.as_str()) {
        let ext = extension_of(&request.file_name).unwrap_or_default();
        if ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            return Ok(());
        }
        return Err(SchedulerError::UnsupportedMediaType(format!(
            "generic content type '{declared}' with unsupported extension '{ext}'"
        )));
    }

    Err(SchedulerError::UnsupportedMediaType(format!(
        "'{declared}' is not a supported audio type"
    )))
}

fn extension_of(file_name: &str) -> Option<&str> {
    file_name.rsplit_once('.').map(|(_, ext)| ext)
}

fn check_size(request: &RawRequest, limit: u64) -> Result<(), SchedulerError> {
    let size = request.bytes.len() as u64;
    if size > limit {
        return Err(SchedulerError::PayloadTooLarge(format!(
            "upload is {size} bytes; limit is {limit} bytes"
        )));
    }
    Ok(())
}

fn resolve_model(
    registry: &ModelRegistry,
    model: Option<&str>,
) -> Result<Option<ModelSpec>, SchedulerError> {
    if ModelRegistry::is_passthrough(model) {
        return Ok(None);
    }
    // Safe: is_passthrough(None) is always true, so `model` is Some here.
    let spec = registry.lookup(model.unwrap())?;
    Ok(Some(spec))
}

fn check_capabilities(
    output_format: OutputFormat,
    with_timestamp: bool,
    capabilities: EngineCapabilities,
    requested_spec: &Option<ModelSpec>,
) -> Result<(), SchedulerError> {
    let needs_timestamp = output_format.requires_timestamp() || with_timestamp;
    if needs_timestamp && !capabilities.timestamp {
        let model_desc = requested_spec
            .as_ref()
            .map(|s| s.alias.as_str())
            .unwrap_or("the current backend");
        return Err(SchedulerError::InfeasibleCapability(format!(
            "{model_desc} does not support timestamp output, required for {}",
            if output_format.requires_timestamp() {
                "srt output_format"
            } else {
                "with_timestamp"
            }
        )));
    }
    Ok(())
}
