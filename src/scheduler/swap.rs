//! Hot model-swap protocol: release the outgoing backend, then load the
//! incoming one, with recovery if the load fails.
//!
//! Release must complete before any new load begins — otherwise two sets of
//! weights live in memory simultaneously and exceed the unified-memory
//! budget on the target class of devices. This ordering is the single most
//! delicate invariant in the whole service; see the state machine in the
//! module-level docs of [`crate::scheduler`].

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::{Backend, Factory};
use crate::error::SchedulerError;
use crate::registry::ModelSpec;

use super::SharedState;
use super::worker;

/// Swap the worker's current backend to `new_spec`. On return, either
/// `current_backend`/`current_spec` reflect `new_spec` (success), or they
/// are unchanged from their pre-call value (release failure or successful
/// recovery), or the shared `degraded` flag is now set (unrecoverable).
pub(super) async fn swap_to(
    current_backend: &mut Box<dyn Backend>,
    current_spec: &mut ModelSpec,
    new_spec: ModelSpec,
    uid: Uuid,
    shared: &Arc<SharedState>,
    make_backend: Factory,
) -> Result<(), SchedulerError> {
    let old_spec = current_spec.clone();

    // Step 1: release the outgoing backend. Must complete before any new
    // load begins. If it fails, memory cannot be safely reclaimed — do not
    // proceed to load; keep the old backend as-is and fail this Job.
    if let Err(e) = current_backend.release().await {
        return Err(SchedulerError::SwapAborted(format!(
            "job {uid}: failed to release '{}': {e}",
            old_spec.alias
        )));
    }

    // Step 2: construct and load the incoming backend.
    let mut candidate = make_backend(&new_spec);
    match candidate.load().await {
        Ok(()) => {
            // Step 3: atomic swap. Single-owner thread, no lock required.
            *current_backend = candidate;
            *current_spec = new_spec.clone();
            worker::publish_snapshot(shared, &new_spec).await;
            info!(job_uid = %uid, from = %old_spec.alias, to = %new_spec.alias, "backend swap completed");
            Ok(())
        }
        Err(load_err) => {
            // Load failed. Try to restore the previous backend (same,
            // already-released instance) so subsequent Jobs can proceed.
            match current_backend.load().await {
                Ok(()) => {
                    warn!(
                        job_uid = %uid,
                        attempted = %new_spec.alias,
                        restored = %old_spec.alias,
                        error = %load_err,
                        "swap load failed; previous backend restored"
                    );
                    // current_backend/current_spec are unchanged: bubble the
                    // load error up so this Job fails while the next Job can
                    // still succeed against the restored backend.
                    Err(SchedulerError::LoadFailed(format!(
                        "failed to load '{}': {load_err}",
                        new_spec.alias
                    )))
                }
                Err(restore_err) => {
                    worker::mark_degraded(shared);
                    Err(SchedulerError::EngineUnrecoverable {
                        load_err: load_err.to_string(),
                        restore_err: restore_err.to_string(),
                    })
                }
            }
        }
    }
}
