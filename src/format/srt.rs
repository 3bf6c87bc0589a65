//! SRT subtitle document rendering.

use crate::backend::TranscriptSegment;

/// Render a sequence of segments as an SRT document.
///
/// Cue numbering is 1-based; cues are separated by a blank line; a segment
/// with a `speaker_id` is prefixed with `[Speaker N]: `.
pub fn render(segments: &[TranscriptSegment]) -> String {
    let mut out = String::new();
    for (idx, segment) in segments.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{}\n", idx + 1));
        out.push_str(&format!(
            "{} --> {}\n",
            format_timestamp(segment.start_ms),
            format_timestamp(segment.end_ms)
        ));
        match &segment.speaker_id {
            Some(speaker) => out.push_str(&format!("[{speaker}]: {}\n", segment.text)),
            None => out.push_str(&format!("{}\n", segment.text)),
        }
    }
    out
}

fn format_timestamp(total_ms: u64) -> String {
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;
    format!("{hours:02}:{mins:02}:{secs:02},{ms:03}")
}
