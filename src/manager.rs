//! The scheduler/executor engine.
//!
//! A [`JobManager`] owns one periodic poll task and spawns an independent
//! executor task per dispatched job. Each cycle queries the store for
//! runnable jobs, gates heavyweight jobs through the
//! [`AdmissionController`], transitions admitted jobs to `Waiting`, and
//! fires off their executors without waiting for them. Executors register
//! with the [`ExecutionRegistry`], drive the `Running` -> terminal
//! transitions, and always write mutations back through the store.

use chrono::Utc;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep, timeout},
};
use tracing::{error, info};

use crate::{
    JobForgeError, Result,
    admission::AdmissionController,
    config::{self, ManagerConfig, ProgressSink},
    job::{Job, JobId, JobState, RunContext},
    registry::ExecutionRegistry,
    store::{InMemoryJobStore, JobStore},
};

/// Outcome of [`JobManager::stop`]: whether the scheduler task and the
/// in-flight executions wound down within the shutdown grace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownStatus {
    pub scheduler_stopped: bool,
    pub executors_finished: bool,
}

impl ShutdownStatus {
    pub fn is_clean(&self) -> bool {
        self.scheduler_stopped && self.executors_finished
    }
}

/// In-process job scheduler: admits jobs with optional scheduled start
/// times, runs them concurrently under a heavyweight admission limit,
/// tracks lifecycle state, and supports cooperative cancellation.
///
/// # Examples
///
/// ```rust,no_run
/// use jobforge::{Job, JobManager, ManagerConfig};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> jobforge::Result<()> {
/// let manager: JobManager<String> = JobManager::start(ManagerConfig::new());
///
/// let job = Job::new("greet", Arc::new(|_ctx| Box::pin(async {
///     Ok(Some("hello".to_string()))
/// })));
/// let id = manager.add(job).await?;
///
/// // ... later
/// manager.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct JobManager<R> {
    store: Arc<dyn JobStore<R>>,
    progress_sink: ProgressSink<R>,
    admission: Arc<AdmissionController>,
    registry: Arc<ExecutionRegistry>,
    shutdown_tx: mpsc::Sender<()>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    shutdown_grace: Duration,
}

impl<R> JobManager<R>
where
    R: Clone + Send + Sync + 'static,
{
    /// Build the manager from `config` and spawn its poll loop. The first
    /// cycle runs immediately. Must be called within a Tokio runtime.
    pub fn start(config: ManagerConfig<R>) -> Self {
        let store = config
            .store
            .unwrap_or_else(|| Arc::new(InMemoryJobStore::new()));
        let progress_sink = config
            .progress_sink
            .unwrap_or_else(config::default_progress_sink);
        let admission = Arc::new(AdmissionController::new(config.heavy_weight_limit));
        let registry = Arc::new(ExecutionRegistry::new());
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let scheduler = tokio::spawn(Self::run_scheduler(
            store.clone(),
            progress_sink.clone(),
            admission.clone(),
            registry.clone(),
            config.poll_interval,
            shutdown_rx,
        ));

        Self {
            store,
            progress_sink,
            admission,
            registry,
            shutdown_tx,
            scheduler: Mutex::new(Some(scheduler)),
            shutdown_grace: config.shutdown_grace,
        }
    }

    /// Persist a new job. The store assigns its id, which is returned.
    pub async fn add(&self, mut job: Job<R>) -> Result<JobId> {
        self.store.save(&mut job).await?;
        Ok(job.id)
    }

    /// Request cancellation of a job. Fails with
    /// [`JobForgeError::JobNotCancelable`] when the job does not permit it.
    pub async fn cancel(&self, id: JobId) -> Result<()> {
        self.cancel_with_force(id, false).await
    }

    /// Request cancellation, overriding the job's `cancelable` flag when
    /// `force` is set. The stored state flips to `Canceled` synchronously;
    /// a running body keeps executing until it observes its token.
    pub async fn cancel_with_force(&self, id: JobId, force: bool) -> Result<()> {
        let mut job = self
            .store
            .get(id)
            .await?
            .ok_or(JobForgeError::JobNotFound { id })?;

        if !job.cancelable && !force {
            return Err(JobForgeError::JobNotCancelable { id });
        }

        job.state = JobState::Canceled;
        job.message = Some("Canceling".to_string());
        self.store.save(&mut job).await?;

        self.registry.cancel(id);
        Ok(())
    }

    /// Force-cancel a job and delete it from the store, whether or not it
    /// was running.
    pub async fn remove(&self, id: JobId) -> Result<()> {
        self.cancel_with_force(id, true).await?;
        self.store.delete(id).await
    }

    /// Invoke the progress sink for a job.
    pub fn report_progress(&self, job: &Job<R>) {
        (self.progress_sink)(job);
    }

    pub fn store(&self) -> Arc<dyn JobStore<R>> {
        self.store.clone()
    }

    /// Number of jobs currently executing.
    pub fn running_count(&self) -> usize {
        self.registry.len()
    }

    pub fn heavy_weight_limit(&self) -> usize {
        self.admission.limit()
    }

    /// Stop the poll loop, then wait (bounded by the shutdown grace) for
    /// in-flight executions to finish. No new jobs are dispatched once the
    /// scheduler has stopped; running bodies are not interrupted.
    pub async fn stop(&self) -> ShutdownStatus {
        let _ = self.shutdown_tx.send(()).await;

        let handle = self
            .scheduler
            .lock()
            .ok()
            .and_then(|mut scheduler| scheduler.take());
        let scheduler_stopped = match handle {
            Some(handle) => matches!(timeout(self.shutdown_grace, handle).await, Ok(Ok(()))),
            None => true,
        };
        info!("Job scheduler terminated: {}", scheduler_stopped);

        let deadline = Instant::now() + self.shutdown_grace;
        let mut executors_finished = true;
        while !self.registry.is_empty() {
            if Instant::now() >= deadline {
                executors_finished = false;
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
        info!("Job executors terminated: {}", executors_finished);

        ShutdownStatus {
            scheduler_stopped,
            executors_finished,
        }
    }

    async fn run_scheduler(
        store: Arc<dyn JobStore<R>>,
        sink: ProgressSink<R>,
        admission: Arc<AdmissionController>,
        registry: Arc<ExecutionRegistry>,
        poll_interval: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        info!("Job scheduler started");

        loop {
            // A failing cycle must never stop future polls.
            if let Err(e) = Self::run_cycle(&store, &sink, &admission, &registry).await {
                error!("Poll cycle failed: {}", e);
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Job scheduler shutting down");
                    break;
                }
                _ = sleep(poll_interval) => {}
            }
        }
    }

    async fn run_cycle(
        store: &Arc<dyn JobStore<R>>,
        sink: &ProgressSink<R>,
        admission: &Arc<AdmissionController>,
        registry: &Arc<ExecutionRegistry>,
    ) -> Result<()> {
        let include_heavy_weight = admission.has_capacity();

        for mut job in store.get_for_running_now(include_heavy_weight).await? {
            if job.heavy_weight && !admission.try_admit() {
                // Slots ran out mid-cycle; the job stays Init for a later poll.
                continue;
            }
            let holds_slot = job.heavy_weight;

            job.state = JobState::Waiting;
            job.message = Some("Waiting".to_string());
            if let Err(e) = save_and_report(store, sink, &mut job).await {
                if holds_slot {
                    admission.release();
                }
                return Err(e);
            }

            tokio::spawn(Self::execute(
                store.clone(),
                sink.clone(),
                admission.clone(),
                registry.clone(),
                job,
            ));
        }

        Ok(())
    }

    async fn execute(
        store: Arc<dyn JobStore<R>>,
        sink: ProgressSink<R>,
        admission: Arc<AdmissionController>,
        registry: Arc<ExecutionRegistry>,
        mut job: Job<R>,
    ) {
        let id = job.id;
        let Some(cancel) = registry.register(id) else {
            return;
        };

        // The job may have been removed between dispatch and execution; a
        // deleted record must never be re-saved into the store.
        if matches!(store.get(id).await, Ok(None)) {
            registry.deregister(id);
            if job.heavy_weight {
                admission.release();
            }
            return;
        }

        let started_wall = Utc::now();
        let started = std::time::Instant::now();
        let mut removed_mid_flight = false;

        let bookkeeping: Result<()> = async {
            if job.start_time.is_none() {
                job.start_time = Some(started_wall);
            }
            job.state = JobState::Running;
            job.message = Some("Running".to_string());
            save_and_report(&store, &sink, &mut job).await?;

            let body = job.body.clone();
            let outcome = (body)(RunContext::new(id, cancel.clone())).await;

            // Reload before deciding the terminal state: an external cancel
            // may have overwritten it while the body ran, and Canceled must
            // not be clobbered by Successful or Failed.
            match store.get(id).await? {
                Some(stored) => job = stored,
                None => {
                    removed_mid_flight = true;
                    return Ok(());
                }
            }

            match outcome {
                Ok(result) => {
                    if job.state == JobState::Running {
                        job.state = JobState::Successful;
                        job.message = Some("Success".to_string());
                        job.result = result;
                    }
                }
                Err(e) => {
                    if job.state == JobState::Running {
                        job.state = JobState::Failed;
                        job.message = Some(format!("Failed: {}", e));
                    }
                }
            }

            Ok(())
        }
        .await;

        if let Err(e) = bookkeeping {
            error!("Execution of job {} failed to persist state: {}", id, e);
        }

        registry.deregister(id);

        if !removed_mid_flight {
            if job.state.is_done() && job.end_time.is_none() {
                job.end_time = Some(Utc::now());
            }
            let elapsed = started.elapsed();
            job.duration = Some(job.duration.map_or(elapsed, |d| d + elapsed));

            if let Err(e) = save_and_report(&store, &sink, &mut job).await {
                error!("Failed to persist final state of job {}: {}", id, e);
            }
        }

        // The slot is held until the terminal state is visible in the store.
        if job.heavy_weight {
            admission.release();
        }
    }
}

async fn save_and_report<R>(
    store: &Arc<dyn JobStore<R>>,
    sink: &ProgressSink<R>,
    job: &mut Job<R>,
) -> Result<()> {
    store.save(job).await?;
    (sink)(job);
    Ok(())
}
