//! The bounded admission queue and strictly serial inference worker.
//!
//! [`Scheduler::spawn`] starts the single long-running worker task and
//! returns a cheaply-cloneable [`Scheduler`] handle used by the admission
//! layer to enqueue [`Job`]s and by the HTTP surface to read a stale-tolerant
//! snapshot of the currently loaded backend.

mod swap;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc, oneshot};
use uuid::Uuid;

use crate::backend::{self, Backend, TranscribeOptions, TranscriptionOutcome};
use crate::error::SchedulerError;
use crate::format::OutputFormat;
use crate::registry::{EngineCapabilities, EngineType, ModelSpec};

/// A unit of work dequeued and processed by the worker, exactly once.
pub struct Job {
    pub uid: Uuid,
    pub scratch_dir: PathBuf,
    pub input_path: PathBuf,
    pub options: TranscribeOptions,
    pub output_format: OutputFormat,
    /// `None` means passthrough: use whatever backend is currently loaded.
    pub requested_spec: Option<ModelSpec>,
    pub received_at: DateTime<Utc>,
    result_tx: oneshot::Sender<Result<JobResult, SchedulerError>>,
}

/// What the worker publishes to a Job's waiter on success.
pub struct JobResult {
    pub outcome: TranscriptionOutcome,
    /// The spec in effect for this particular Job, determined before
    /// `transcribe` was called so a concurrent swap cannot mislabel it.
    pub response_spec: ModelSpec,
}

enum Message {
    Job(Job),
    Shutdown,
}

/// Read-only, possibly-stale snapshot of the worker's current backend,
/// refreshed by the worker after every swap. Safe for lock-free-ish
/// concurrent reads from the HTTP surface.
#[derive(Debug, Clone)]
pub struct CurrentSnapshot {
    pub alias: String,
    pub model_id: String,
    pub engine_type: EngineType,
    pub capabilities: EngineCapabilities,
}

impl From<&ModelSpec> for CurrentSnapshot {
    fn from(spec: &ModelSpec) -> Self {
        Self {
            alias: spec.alias.clone(),
            model_id: spec.model_id.clone(),
            engine_type: spec.engine_type,
            capabilities: spec.capabilities,
        }
    }
}

/// Shared state written only by the worker and read by the HTTP surface.
/// This is the "lightweight snapshot primitive" called for in §9 of the
/// design: cheap to read, always reflects the worker's last committed state.
struct SharedState {
    snapshot: RwLock<CurrentSnapshot>,
    degraded: AtomicBool,
}

/// Handle to the scheduler: cheaply cloneable, safe to share across all
/// admission-layer tasks.
#[derive(Clone)]
pub struct Scheduler {
    job_tx: mpsc::Sender<Message>,
    queue_capacity: usize,
    shared: Arc<SharedState>,
}

impl Scheduler {
    /// Start the worker task with `initial_spec` loaded, using the
    /// production [`backend::factory`], and return a handle. The returned
    /// `JoinHandle` resolves once the worker drains its sentinel and
    /// returns (graceful shutdown).
    pub async fn spawn(
        initial_spec: ModelSpec,
        queue_capacity: usize,
    ) -> anyhow::Result<(Self, tokio::task::JoinHandle<()>)> {
        Self::spawn_with_factory(initial_spec, queue_capacity, Arc::new(backend::factory)).await
    }

    /// Like [`Scheduler::spawn`], but with an injectable backend
    /// constructor. Every swap during this scheduler's lifetime — not just
    /// the startup load — uses `make_backend`, so tests can substitute
    /// failure-injecting backends to exercise the swap protocol's recovery
    /// paths.
    pub async fn spawn_with_factory(
        initial_spec: ModelSpec,
        queue_capacity: usize,
        make_backend: backend::Factory,
    ) -> anyhow::Result<(Self, tokio::task::JoinHandle<()>)> {
        let mut backend = make_backend(&initial_spec);
        backend
            .load()
            .await
            .map_err(|e| anyhow::anyhow!("failed to load startup backend: {e}"))?;

        let shared = Arc::new(SharedState {
            snapshot: RwLock::new(CurrentSnapshot::from(&initial_spec)),
            degraded: AtomicBool::new(false),
        });

        let (job_tx, job_rx) = mpsc::channel(queue_capacity.max(1));

        let worker_shared = Arc::clone(&shared);
        let join = tokio::spawn(worker::run(
            job_rx,
            backend,
            initial_spec,
            worker_shared,
            make_backend,
        ));

        Ok((
            Self {
                job_tx,
                queue_capacity,
                shared,
            },
            join,
        ))
    }

    /// Admit a Job onto the FIFO. Rejects immediately with
    /// [`SchedulerError::ServiceBusy`] if the queue is full; never blocks.
    pub fn try_enqueue(
        &self,
        job_args: JobArgs,
    ) -> Result<oneshot::Receiver<Result<JobResult, SchedulerError>>, SchedulerError> {
        let (result_tx, result_rx) = oneshot::channel();
        let job = Job {
            uid: job_args.uid,
            scratch_dir: job_args.scratch_dir,
            input_path: job_args.input_path,
            options: job_args.options,
            output_format: job_args.output_format,
            requested_spec: job_args.requested_spec,
            received_at: job_args.received_at,
            result_tx,
        };
        self.job_tx
            .try_send(Message::Job(job))
            .map_err(|_| SchedulerError::ServiceBusy {
                capacity: self.queue_capacity,
            })?;
        Ok(result_rx)
    }

    /// Push the shutdown sentinel. Jobs already queued ahead of it are
    /// processed to completion; anything submitted after this call races
    /// with the worker's teardown and may be rejected once the channel
    /// closes.
    pub async fn shutdown(&self) {
        let _ = self.job_tx.send(Message::Shutdown).await;
    }

    /// A read-only, possibly-stale snapshot of the current backend.
    pub async fn current_snapshot(&self) -> CurrentSnapshot {
        self.shared.snapshot.read().await.clone()
    }

    /// Current FIFO depth (approximate, racy by design — informational only).
    pub fn queue_depth(&self) -> usize {
        self.queue_capacity.saturating_sub(self.job_tx.capacity())
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Whether the scheduler has entered the sticky degraded state.
    pub fn is_degraded(&self) -> bool {
        self.shared.degraded.load(Ordering::Acquire)
    }
}

/// Plain-data arguments for constructing a [`Job`], kept separate from `Job`
/// itself so the admission layer never has to construct the result channel.
pub struct JobArgs {
    pub uid: Uuid,
    pub scratch_dir: PathBuf,
    pub input_path: PathBuf,
    pub options: TranscribeOptions,
    pub output_format: OutputFormat,
    pub requested_spec: Option<ModelSpec>,
    pub received_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::backend::BackendError;
    use crate::registry::ModelRegistry;

    fn job_args(requested_spec: Option<ModelSpec>) -> JobArgs {
        let uid = Uuid::new_v4();
        JobArgs {
            uid,
            scratch_dir: std::env::temp_dir().join(format!("asr-scheduler-test-{uid}")),
            input_path: std::env::temp_dir().join(format!("asr-scheduler-test-{uid}-input")),
            options: TranscribeOptions::default(),
            output_format: OutputFormat::Json,
            requested_spec,
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn queue_full_rejects_third_admission_immediately() {
        let registry = ModelRegistry::with_builtins();
        let qwen = registry.lookup("qwen3-asr").unwrap();
        let (scheduler, _join) = Scheduler::spawn(qwen, 2).await.unwrap();

        // No `.await` between these three calls: on the current-thread test
        // runtime the worker task cannot run (and so cannot drain the
        // channel) until this task yields, so the queue is genuinely full
        // by the third call, not just racing the worker.
        let _rx1 = scheduler.try_enqueue(job_args(None)).unwrap();
        let _rx2 = scheduler.try_enqueue(job_args(None)).unwrap();
        match scheduler.try_enqueue(job_args(None)) {
            Err(SchedulerError::ServiceBusy { capacity }) => assert_eq!(capacity, 2),
            other => panic!("expected ServiceBusy, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scratch_dir_is_reclaimed_even_when_backend_fails() {
        let registry = ModelRegistry::with_builtins();
        let qwen = registry.lookup("qwen3-asr").unwrap();
        let (scheduler, _join) = Scheduler::spawn(qwen, 4).await.unwrap();

        let uid = Uuid::new_v4();
        let scratch_dir = std::env::temp_dir().join(format!("asr-scheduler-test-reclaim-{uid}"));
        tokio::fs::create_dir_all(&scratch_dir).await.unwrap();
        // No file materialised at input_path: the backend's stat will fail,
        // so the Job fails -- scratch reclamation must still happen.
        let input_path = scratch_dir.join("original.wav");

        let rx = scheduler
            .try_enqueue(JobArgs {
                uid,
                scratch_dir: scratch_dir.clone(),
                input_path,
                options: TranscribeOptions::default(),
                output_format: OutputFormat::Json,
                requested_spec: None,
                received_at: Utc::now(),
            })
            .unwrap();

        let result = rx.await.unwrap();
        assert!(result.is_err());
        assert!(!scratch_dir.exists());
    }

    /// A controllable [`Backend`] stand-in for exercising the swap protocol's
    /// three outcomes without depending on the real engine stand-ins' timing.
    #[derive(Default)]
    struct MockState {
        log: Vec<String>,
        fail_loads_remaining: HashMap<String, u32>,
        fail_releases_remaining: HashMap<String, u32>,
    }

    struct MockRegistry(Mutex<MockState>);

    impl MockRegistry {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(MockState::default())))
        }

        fn fail_next_load(&self, alias: &str, times: u32) {
            self.0
                .lock()
                .unwrap()
                .fail_loads_remaining
                .insert(alias.to_string(), times);
        }

        fn log(&self) -> Vec<String> {
            self.0.lock().unwrap().log.clone()
        }
    }

    struct MockBackend {
        spec: ModelSpec,
        registry: Arc<MockRegistry>,
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn load(&mut self) -> Result<(), BackendError> {
            let mut state = self.registry.0.lock().unwrap();
            state.log.push(format!("{}.load", self.spec.alias));
            let remaining = state
                .fail_loads_remaining
                .entry(self.spec.alias.clone())
                .or_insert(0);
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BackendError::LoadFailed("injected failure".into()));
            }
            Ok(())
        }

        async fn release(&mut self) -> Result<(), BackendError> {
            let mut state = self.registry.0.lock().unwrap();
            state.log.push(format!("{}.release", self.spec.alias));
            let remaining = state
                .fail_releases_remaining
                .entry(self.spec.alias.clone())
                .or_insert(0);
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BackendError::ReleaseFailed("injected failure".into()));
            }
            Ok(())
        }

        async fn transcribe(
            &mut self,
            _path: &Path,
            _options: &TranscribeOptions,
        ) -> Result<TranscriptionOutcome, BackendError> {
            self.registry
                .0
                .lock()
                .unwrap()
                .log
                .push(format!("{}.transcribe", self.spec.alias));
            Ok(TranscriptionOutcome {
                text: format!("mock output from {}", self.spec.alias),
                segments: None,
                language: None,
                audio_duration_secs: Some(0.0),
            })
        }

        fn capabilities(&self) -> EngineCapabilities {
            self.spec.capabilities
        }
    }

    fn mock_factory(registry: Arc<MockRegistry>) -> backend::Factory {
        Arc::new(move |spec: &ModelSpec| -> Box<dyn Backend> {
            Box::new(MockBackend {
                spec: spec.clone(),
                registry: Arc::clone(&registry),
            })
        })
    }

    #[tokio::test]
    async fn successful_swap_releases_old_then_loads_new_with_no_redundant_calls() {
        let registry = ModelRegistry::with_builtins();
        let qwen = registry.lookup("qwen3-asr").unwrap();
        let paraformer = registry.lookup("paraformer").unwrap();

        let mock = MockRegistry::new();
        let (scheduler, _join) =
            Scheduler::spawn_with_factory(qwen.clone(), 10, mock_factory(Arc::clone(&mock)))
                .await
                .unwrap();

        let rx_a = scheduler.try_enqueue(job_args(Some(paraformer.clone()))).unwrap();
        let result_a = rx_a.await.unwrap().unwrap();
        assert_eq!(result_a.response_spec.alias, "paraformer");

        let rx_b = scheduler.try_enqueue(job_args(Some(paraformer.clone()))).unwrap();
        let result_b = rx_b.await.unwrap().unwrap();
        assert_eq!(result_b.response_spec.alias, "paraformer");

        assert_eq!(
            mock.log(),
            vec![
                "qwen3-asr.load",        // startup
                "qwen3-asr.release",     // swap step 1
                "paraformer.load",       // swap step 2
                "paraformer.transcribe", // job A
                "paraformer.transcribe", // job B -- no second release/load
            ]
        );
        assert_eq!(scheduler.current_snapshot().await.alias, "paraformer");
    }

    #[tokio::test]
    async fn swap_load_failure_restores_old_backend_but_fails_this_job() {
        let registry = ModelRegistry::with_builtins();
        let qwen = registry.lookup("qwen3-asr").unwrap();
        let paraformer = registry.lookup("paraformer").unwrap();

        let mock = MockRegistry::new();
        mock.fail_next_load("paraformer", 1);
        let (scheduler, _join) =
            Scheduler::spawn_with_factory(qwen.clone(), 10, mock_factory(Arc::clone(&mock)))
                .await
                .unwrap();

        let rx_a = scheduler.try_enqueue(job_args(Some(paraformer.clone()))).unwrap();
        let err = rx_a.await.unwrap().unwrap_err();
        assert!(matches!(err, SchedulerError::LoadFailed(_)));
        assert!(!scheduler.is_degraded());
        assert_eq!(scheduler.current_snapshot().await.alias, "qwen3-asr");

        // Next Job, passthrough, succeeds against the restored backend.
        let rx_b = scheduler.try_enqueue(job_args(None)).unwrap();
        let result_b = rx_b.await.unwrap().unwrap();
        assert_eq!(result_b.response_spec.alias, "qwen3-asr");
    }

    #[tokio::test]
    async fn swap_double_failure_marks_scheduler_degraded_and_sticks() {
        let registry = ModelRegistry::with_builtins();
        let qwen = registry.lookup("qwen3-asr").unwrap();
        let paraformer = registry.lookup("paraformer").unwrap();

        let mock = MockRegistry::new();
        mock.fail_next_load("paraformer", 1);
        let (scheduler, _join) =
            Scheduler::spawn_with_factory(qwen.clone(), 10, mock_factory(Arc::clone(&mock)))
                .await
                .unwrap();

        // Startup already consumed qwen3-asr's first (successful) load, so
        // this failure only hits the restore attempt inside swap_to.
        mock.fail_next_load("qwen3-asr", 1);

        let rx_a = scheduler.try_enqueue(job_args(Some(paraformer.clone()))).unwrap();
        let err = rx_a.await.unwrap().unwrap_err();
        assert!(matches!(err, SchedulerError::EngineUnrecoverable { .. }));
        assert!(scheduler.is_degraded());

        // Every subsequent Job fails fast with the same taxonomy code.
        let rx_b = scheduler.try_enqueue(job_args(None)).unwrap();
        let err_b = rx_b.await.unwrap().unwrap_err();
        assert!(matches!(err_b, SchedulerError::DegradedService));
    }
}
