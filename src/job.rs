//! Job records and the lifecycle state machine.
//!
//! A [`Job`] is the unit of work managed by the scheduler: identity and
//! metadata, a lifecycle [`JobState`], timing bookkeeping, a typed result
//! produced on success, and the async body that performs the work. Records
//! are owned by a [`JobStore`](crate::store::JobStore) for the duration of
//! their existence; the scheduler and executors hold transient copies and
//! write every mutation back through the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, pin::Pin, str::FromStr, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{JobForgeError, Result};

/// Store-assigned job identifier. Positive once persisted; a value of zero or
/// below means "not yet assigned".
pub type JobId = i64;

/// The async work function attached to a job.
///
/// The body receives a [`RunContext`] carrying the job's cancellation token
/// and returns the typed result to record on success, or `None` when the job
/// produces no payload. A failure becomes the job's `Failed` state and
/// message; it never propagates out of the executor.
pub type JobBody<R> = Arc<
    dyn Fn(RunContext) -> Pin<Box<dyn Future<Output = Result<Option<R>>> + Send>> + Send + Sync,
>;

/// Lifecycle states of a job.
///
/// Transitions are `Init -> Waiting -> Running -> {Successful, Failed,
/// Canceled}`. `Canceled` may also be entered directly from `Waiting` or
/// `Running` through [`JobManager::cancel`](crate::manager::JobManager::cancel).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobState {
    Init,
    Waiting,
    Running,
    /// Reserved. No transition produces or consumes this state.
    Paused,
    Successful,
    Failed,
    Canceled,
}

impl JobState {
    /// Whether the state is terminal.
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            JobState::Successful | JobState::Failed | JobState::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Init => "init",
            JobState::Waiting => "waiting",
            JobState::Running => "running",
            JobState::Paused => "paused",
            JobState::Successful => "successful",
            JobState::Failed => "failed",
            JobState::Canceled => "canceled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = JobForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "init" => Ok(JobState::Init),
            "waiting" => Ok(JobState::Waiting),
            "running" => Ok(JobState::Running),
            "paused" => Ok(JobState::Paused),
            "successful" => Ok(JobState::Successful),
            "failed" => Ok(JobState::Failed),
            "canceled" => Ok(JobState::Canceled),
            other => Err(JobForgeError::Store {
                message: format!("unknown job state: {other}"),
            }),
        }
    }
}

/// Execution context handed to a job body.
///
/// Cancellation is cooperative: the body is expected to check
/// [`is_canceled`](RunContext::is_canceled) or await
/// [`canceled`](RunContext::canceled) at convenient points and return
/// promptly. Nothing preempts a body that ignores the token.
#[derive(Debug, Clone)]
pub struct RunContext {
    job_id: JobId,
    cancel: CancellationToken,
}

impl RunContext {
    /// Build a context directly, e.g. to drive a body in a test.
    pub fn new(job_id: JobId, cancel: CancellationToken) -> Self {
        Self { job_id, cancel }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Whether cancellation has been requested for this job.
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once cancellation is requested. Useful inside
    /// `tokio::select!` around long waits.
    pub async fn canceled(&self) {
        self.cancel.cancelled().await
    }
}

/// A unit of work with identity, lifecycle state, timing, and a typed result.
///
/// Construct with [`Job::new`] and the builder methods, then hand to
/// [`JobManager::add`](crate::manager::JobManager::add); the store assigns
/// the id on first save.
///
/// # Examples
///
/// ```rust
/// use jobforge::{Job, JobState};
/// use std::sync::Arc;
///
/// let job: Job<u64> = Job::new(
///     "count",
///     Arc::new(|_ctx| Box::pin(async { Ok(Some(42)) })),
/// )
/// .with_description("counts something")
/// .as_cancelable();
///
/// assert_eq!(job.state, JobState::Init);
/// assert!(job.id <= 0);
/// ```
#[derive(Clone)]
pub struct Job<R> {
    pub id: JobId,
    pub name: String,
    pub description: Option<String>,
    pub state: JobState,
    /// Human-readable status, overwritten on every transition.
    pub message: Option<String>,
    /// Heavyweight jobs count against the manager's admission limit while
    /// in `Waiting` or `Running`.
    pub heavy_weight: bool,
    /// Whether [`cancel`](crate::manager::JobManager::cancel) without force
    /// is permitted.
    pub cancelable: bool,
    /// The job is not runnable before this instant.
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Set once, on the first execution attempt.
    pub start_time: Option<DateTime<Utc>>,
    /// Set once, when the state becomes terminal.
    pub end_time: Option<DateTime<Utc>>,
    /// Cumulative wall-clock time across all execution attempts.
    pub duration: Option<Duration>,
    /// Present only after the job completed successfully.
    pub result: Option<R>,
    pub body: JobBody<R>,
}

impl<R> Job<R> {
    pub fn new(name: impl Into<String>, body: JobBody<R>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: None,
            state: JobState::Init,
            message: None,
            heavy_weight: false,
            cancelable: false,
            scheduled_time: None,
            start_time: None,
            end_time: None,
            duration: None,
            result: None,
            body,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the job as heavyweight, subject to admission control.
    pub fn as_heavy_weight(mut self) -> Self {
        self.heavy_weight = true;
        self
    }

    /// Permit voluntary cancellation without force.
    pub fn as_cancelable(mut self) -> Self {
        self.cancelable = true;
        self
    }

    pub fn with_scheduled_time(mut self, scheduled_time: DateTime<Utc>) -> Self {
        self.scheduled_time = Some(scheduled_time);
        self
    }

    /// Schedule the job to become runnable `delay` from now.
    pub fn with_scheduled_delay(mut self, delay: chrono::Duration) -> Self {
        self.scheduled_time = Some(Utc::now() + delay);
        self
    }
}

impl<R: fmt::Debug> fmt::Debug for Job<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("state", &self.state)
            .field("message", &self.message)
            .field("heavy_weight", &self.heavy_weight)
            .field("cancelable", &self.cancelable)
            .field("scheduled_time", &self.scheduled_time)
            .field("start_time", &self.start_time)
            .field("end_time", &self.end_time)
            .field("duration", &self.duration)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

/// A stub body for records rehydrated from a durable store.
///
/// Bodies are runtime state and cannot be persisted; a job loaded from disk
/// carries this stub until a real body is re-attached, and fails with a
/// descriptive message if executed as-is.
pub fn missing_body<R: Send + 'static>() -> JobBody<R> {
    Arc::new(|ctx| {
        Box::pin(async move { Err(JobForgeError::BodyMissing { id: ctx.job_id() }) })
    })
}
