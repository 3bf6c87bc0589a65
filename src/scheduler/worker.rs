//! The single long-running consumer task.
//!
//! Pops Jobs off the FIFO one at a time, performs an optional swap, runs
//! inference, publishes the result, and unconditionally reclaims the Job's
//! scratch directory — in that order, on every exit path.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use tracing::{error, info, info_span, warn, Instrument};

use crate::backend::{Backend, Factory};
use crate::error::SchedulerError;
use crate::registry::ModelSpec;

use super::{CurrentSnapshot, Job, JobResult, Message, SharedState};

pub(super) async fn run(
    mut job_rx: mpsc::Receiver<Message>,
    mut current_backend: Box<dyn Backend>,
    mut current_spec: ModelSpec,
    shared: Arc<SharedState>,
    make_backend: Factory,
) {
    info!(alias = %current_spec.alias, "scheduler worker started");

    while let Some(message) = job_rx.recv().await {
        let job = match message {
            Message::Job(job) => job,
            Message::Shutdown => break,
        };

        let span = info_span!(
            "job",
            job_uid = %job.uid,
            engine_type = ?current_spec.engine_type,
        );
        process_job(job, &mut current_backend, &mut current_spec, &shared, make_backend.clone())
            .instrument(span)
            .await;
    }

    info!("scheduler worker stopped");
}

async fn process_job(
    job: Job,
    current_backend: &mut Box<dyn Backend>,
    current_spec: &mut ModelSpec,
    shared: &Arc<SharedState>,
    make_backend: Factory,
) {
    let Job {
        uid,
        scratch_dir,
        input_path,
        options,
        requested_spec,
        result_tx,
        ..
    } = job;

    let result = run_job(
        uid,
        &input_path,
        &options,
        requested_spec,
        current_backend,
        current_spec,
        shared,
        make_backend,
    )
    .await;

    // Scratch reclamation runs on every exit path, success or failure.
    if let Err(e) = tokio::fs::remove_dir_all(&scratch_dir).await {
        warn!(job_uid = %uid, path = %scratch_dir.display(), error = %e, "failed to reclaim scratch dir");
    }

    let _ = result_tx.send(result);
}

#[allow(clippy::too_many_arguments)]
async fn run_job(
    uid: uuid::Uuid,
    input_path: &std::path::Path,
    options: &crate::backend::TranscribeOptions,
    requested_spec: Option<ModelSpec>,
    current_backend: &mut Box<dyn Backend>,
    current_spec: &mut ModelSpec,
    shared: &Arc<SharedState>,
    make_backend: Factory,
) -> Result<JobResult, SchedulerError> {
    if shared.degraded.load(Ordering::Acquire) {
        return Err(SchedulerError::DegradedService);
    }

    if let Some(spec) = &requested_spec {
        if spec != current_spec {
            super::swap::swap_to(current_backend, current_spec, spec.clone(), uid, shared, make_backend).await?;
        }
    }

    // Determined before calling transcribe, so the response always reflects
    // the spec this Job actually ran against even if the next Job in the
    // FIFO triggers another swap immediately afterwards.
    let response_spec = requested_spec.unwrap_or_else(|| current_spec.clone());

    let outcome = current_backend
        .transcribe(input_path, options)
        .await
        .map_err(|e| SchedulerError::BackendInternal(e.to_string()))?;

    Ok(JobResult {
        outcome,
        response_spec,
    })
}

pub(super) async fn publish_snapshot(shared: &Arc<SharedState>, spec: &ModelSpec) {
    let mut guard = shared.snapshot.write().await;
    *guard = CurrentSnapshot::from(spec);
}

pub(super) fn mark_degraded(shared: &Arc<SharedState>) {
    shared.degraded.store(true, Ordering::Release);
    error!("scheduler entered degraded state; restart required to clear");
}
