//! Scratch directory materialisation.
//!
//! Each admitted upload is copied to a dedicated, recognisably-prefixed
//! temporary directory under the OS temp area before the Job is enqueued.
//! Ownership of the directory transfers to the Job at that point; the
//! scheduler worker's terminal cleanup always deletes it, on every exit
//! path — see [`crate::scheduler::worker`].

use std::path::PathBuf;

use bytes::Bytes;
use uuid::Uuid;

use crate::error::SchedulerError;

/// Recognisable prefix for scratch directories, so they're identifiable (and
/// safely globbable for cleanup) in the OS temp area.
const SCRATCH_PREFIX: &str = "asr-scheduler-job-";

/// Create a per-Job scratch directory and copy `bytes` into
/// `original.<ext>` inside it. Any failure deletes the directory before
/// surfacing the error.
pub async fn materialize_upload(
    uid: Uuid,
    file_name: &str,
    bytes: &Bytes,
) -> Result<(PathBuf, PathBuf), SchedulerError> {
    let dir = std::env::temp_dir().join(format!("{SCRATCH_PREFIX}{uid}"));

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| SchedulerError::Internal(format!("failed to create scratch dir: {e}")))?;

    let ext = file_name.rsplit_once('.').map(|(_, e)| e).unwrap_or("bin");
    let dest = dir.join(format!("original.{ext}"));

    if let Err(e) = tokio::fs::write(&dest, bytes).await {
        let _ = tokio::fs::remove_dir_all(&dir).await;
        return Err(SchedulerError::Internal(format!(
            "failed to materialise upload: {e}"
        )));
    }

    Ok((dir, dest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn materializes_file_with_preserved_extension() {
        let uid = Uuid::new_v4();
        let bytes = Bytes::from_static(b"RIFF....WAVE");
        let (dir, path) = materialize_upload(uid, "clip.wav", &bytes).await.unwrap();

        assert!(dir.file_name().unwrap().to_string_lossy().contains(&uid.to_string()));
        assert_eq!(path.file_name().unwrap(), "original.wav");
        assert_eq!(tokio::fs::read(&path).await.unwrap(), bytes.to_vec());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn falls_back_to_bin_extension_when_missing() {
        let uid = Uuid::new_v4();
        let bytes = Bytes::from_static(b"data");
        let (dir, path) = materialize_upload(uid, "noext", &bytes).await.unwrap();
        assert_eq!(path.file_name().unwrap(), "original.bin");
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
