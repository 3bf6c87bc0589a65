//! Output-format normalisation and response rendering.
//!
//! A transcription request carries either a modern `output_format`
//! (`json`|`txt`|`srt`) or a legacy OpenAI-compatible `response_format`
//! (`verbose_json`|`text`|`vtt`, plus the bare modern values). When both are
//! present the legacy field wins; an unrecognised value is a bad request.

pub mod srt;

use serde::Serialize;

use crate::backend::{TranscriptSegment, TranscriptionOutcome};
use crate::error::SchedulerError;

/// The three output shapes the HTTP surface can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Txt,
    Srt,
}

impl OutputFormat {
    fn parse_modern(raw: &str) -> Option<Self> {
        match raw {
            "json" => Some(Self::Json),
            "txt" => Some(Self::Txt),
            "srt" => Some(Self::Srt),
            _ => None,
        }
    }

    fn parse_legacy(raw: &str) -> Option<Self> {
        match raw {
            "verbose_json" => Some(Self::Json),
            "text" => Some(Self::Txt),
            "vtt" => Some(Self::Srt),
            other => Self::parse_modern(other),
        }
    }

    /// True iff this format requires the backend to produce timestamps.
    pub fn requires_timestamp(self) -> bool {
        matches!(self, Self::Srt)
    }
}

/// Resolve the effective output format from the two request fields. The
/// legacy `response_format` wins when both are supplied.
pub fn normalize(
    output_format: Option<&str>,
    response_format: Option<&str>,
) -> Result<OutputFormat, SchedulerError> {
    if let Some(raw) = response_format {
        return OutputFormat::parse_legacy(raw)
            .ok_or_else(|| SchedulerError::BadRequest(format!("unrecognised response_format '{raw}'")));
    }
    if let Some(raw) = output_format {
        return OutputFormat::parse_modern(raw)
            .ok_or_else(|| SchedulerError::BadRequest(format!("unrecognised output_format '{raw}'")));
    }
    Ok(OutputFormat::Json)
}

/// The `json`/`txt` response body schema (§6 of the design). For `txt`
/// output, `segments` is always `None`.
#[derive(Debug, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
    pub duration: Option<f64>,
    pub language: Option<String>,
    pub model: Option<String>,
    pub segments: Option<Vec<SegmentView>>,
}

#[derive(Debug, Serialize)]
pub struct SegmentView {
    pub id: usize,
    pub speaker: Option<String>,
    pub start: u64,
    pub end: u64,
    pub text: String,
}

impl TranscriptionResponse {
    pub fn from_outcome(outcome: &TranscriptionOutcome, model_alias: Option<String>, include_segments: bool) -> Self {
        let segments = if include_segments {
            outcome.segments.as_ref().map(|segs| {
                segs.iter()
                    .enumerate()
                    .map(|(id, s)| SegmentView {
                        id,
                        speaker: s.speaker_id.clone(),
                        start: s.start_ms,
                        end: s.end_ms,
                        text: s.text.clone(),
                    })
                    .collect()
            })
        } else {
            None
        };

        Self {
            text: outcome.text.clone(),
            duration: outcome.audio_duration_secs,
            language: outcome.language.clone(),
            model: model_alias,
            segments,
        }
    }
}

/// Render the SRT document for a set of segments: `HH:MM:SS,mmm -->
/// HH:MM:SS,mmm` timestamps, a blank line between cues, 1-based cue
/// numbering, and a `[Speaker N]: ` prefix when a speaker id is present.
pub fn render_srt(segments: &[TranscriptSegment]) -> String {
    srt::render(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_wins_over_modern_when_both_present() {
        let fmt = normalize(Some("txt"), Some("verbose_json")).unwrap();
        assert_eq!(fmt, OutputFormat::Json);
    }

    #[test]
    fn legacy_mapping() {
        assert_eq!(normalize(None, Some("verbose_json")).unwrap(), OutputFormat::Json);
        assert_eq!(normalize(None, Some("text")).unwrap(), OutputFormat::Txt);
        assert_eq!(normalize(None, Some("vtt")).unwrap(), OutputFormat::Srt);
    }

    #[test]
    fn modern_values_accepted_in_legacy_field() {
        assert_eq!(normalize(None, Some("srt")).unwrap(), OutputFormat::Srt);
    }

    #[test]
    fn defaults_to_json_when_absent() {
        assert_eq!(normalize(None, None).unwrap(), OutputFormat::Json);
    }

    #[test]
    fn unrecognised_value_is_bad_request() {
        assert!(normalize(Some("exotic"), None).is_err());
        assert!(normalize(None, Some("exotic")).is_err());
    }

    #[test]
    fn srt_requires_timestamp() {
        assert!(OutputFormat::Srt.requires_timestamp());
        assert!(!OutputFormat::Json.requires_timestamp());
        assert!(!OutputFormat::Txt.requires_timestamp());
    }
}
