//! `POST /v1/audio/transcriptions` — the OpenAI-compatible multipart surface.

use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use bytes::Bytes;
use uuid::Uuid;

use crate::admission::{self, RawRequest};
use crate::error::{ApiError, SchedulerError};
use crate::format::{OutputFormat, TranscriptionResponse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/audio/transcriptions", post(transcribe))
}

async fn transcribe(
    State(state): State<AppState>,
    request_id: Option<Extension<Uuid>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    // Falls back to a fresh id if `TraceLayer` isn't mounted (e.g. handler
    // unit tests exercised without the full middleware stack).
    let request_id = request_id.map(|Extension(id)| id).unwrap_or_else(Uuid::new_v4);
    let result = handle(state, multipart).await;
    result.map_err(|e| ApiError::new(request_id, e))
}

async fn handle(state: AppState, mut multipart: Multipart) -> Result<Response, SchedulerError> {
    let request = parse_form(&mut multipart).await?;

    let (job_result, output_format) = admission::admit(
        &state.scheduler,
        &state.registry,
        state.config.max_upload_size_bytes,
        request,
    )
    .await?;

    Ok(render(job_result, output_format))
}

fn render(job_result: crate::scheduler::JobResult, output_format: OutputFormat) -> Response {
    let crate::scheduler::JobResult {
        outcome,
        response_spec,
    } = job_result;

    match output_format {
        OutputFormat::Json | OutputFormat::Txt => {
            let body = TranscriptionResponse::from_outcome(
                &outcome,
                Some(response_spec.alias),
                matches!(output_format, OutputFormat::Json),
            );
            Json(body).into_response()
        }
        OutputFormat::Srt => {
            let segments = outcome.segments.unwrap_or_default();
            let srt = crate::format::render_srt(&segments);
            (
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                srt,
            )
                .into_response()
        }
    }
}

/// Parse and validate the multipart form into a [`RawRequest`]. Unlike
/// `admission::admit`'s checks, this stage only concerns itself with the
/// shape of the multipart body itself, not audio-domain validity.
async fn parse_form(multipart: &mut Multipart) -> Result<RawRequest, SchedulerError> {
    let mut request = RawRequest::default();
    let mut have_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| SchedulerError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        let Some(name) = field.name().map(ToOwned::to_owned) else {
            continue;
        };

        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(ToOwned::to_owned)
                    .ok_or_else(|| SchedulerError::BadRequest("file field is missing a filename".into()))?;
                let content_type = field.content_type().map(ToOwned::to_owned);
                let bytes: Bytes = field
                    .bytes()
                    .await
                    .map_err(|e| SchedulerError::BadRequest(format!("failed to read file bytes: {e}")))?;
                request.file_name = file_name;
                request.declared_content_type = content_type;
                request.bytes = bytes;
                have_file = true;
            }
            "model" => {
                request.model = Some(text_field(field).await?).filter(|v| !v.is_empty());
            }
            "language" => {
                request.language = Some(text_field(field).await?).filter(|v| !v.is_empty());
            }
            "output_format" => {
                request.output_format = Some(text_field(field).await?).filter(|v| !v.is_empty());
            }
            "response_format" => {
                request.response_format = Some(text_field(field).await?).filter(|v| !v.is_empty());
            }
            "with_timestamp" => {
                let raw = text_field(field).await?;
                request.with_timestamp = matches!(raw.as_str(), "true" | "1" | "yes");
            }
            _ => {}
        }
    }

    if !have_file {
        return Err(SchedulerError::BadRequest(
            "missing required multipart field: file".into(),
        ));
    }
    if request.bytes.is_empty() {
        return Err(SchedulerError::BadRequest("uploaded file is empty".into()));
    }

    Ok(request)
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, SchedulerError> {
    field
        .text()
        .await
        .map(|s| s.trim().to_string())
        .map_err(|e| SchedulerError::BadRequest(format!("invalid form field: {e}")))
}
