//! Configuration for [`JobManager`](crate::manager::JobManager).

use std::{sync::Arc, time::Duration};
use tracing::debug;

use crate::{job::Job, store::JobStore};

/// Callback invoked synchronously on every observable job state transition.
///
/// Runs on the scheduler or executor task that performed the transition, so
/// it must not block significantly.
pub type ProgressSink<R> = Arc<dyn Fn(&Job<R>) + Send + Sync>;

/// Delay between the end of one poll cycle and the start of the next.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Bound on how long [`stop`](crate::manager::JobManager::stop) waits for
/// the scheduler and for in-flight executions, each.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

/// Builder-style configuration for a [`JobManager`](crate::manager::JobManager).
///
/// Every field has a default: an in-memory store, a `tracing` debug sink,
/// a heavyweight limit equal to the host's available parallelism, a 5 s
/// poll cadence, and a 60 s shutdown grace.
///
/// # Examples
///
/// ```rust
/// use jobforge::ManagerConfig;
/// use std::time::Duration;
///
/// let config: ManagerConfig<()> = ManagerConfig::new()
///     .with_heavy_weight_limit(4)
///     .with_poll_interval(Duration::from_secs(1));
/// ```
pub struct ManagerConfig<R> {
    pub(crate) store: Option<Arc<dyn JobStore<R>>>,
    pub(crate) progress_sink: Option<ProgressSink<R>>,
    pub(crate) heavy_weight_limit: usize,
    pub(crate) poll_interval: Duration,
    pub(crate) shutdown_grace: Duration,
}

impl<R> ManagerConfig<R> {
    pub fn new() -> Self {
        Self {
            store: None,
            progress_sink: None,
            heavy_weight_limit: 0,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn JobStore<R>>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_progress_sink(mut self, sink: impl Fn(&Job<R>) + Send + Sync + 'static) -> Self {
        self.progress_sink = Some(Arc::new(sink));
        self
    }

    /// Concurrent limit for heavyweight jobs. Zero means "use the host's
    /// available parallelism".
    pub fn with_heavy_weight_limit(mut self, limit: usize) -> Self {
        self.heavy_weight_limit = limit;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

impl<R> Default for ManagerConfig<R> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn default_progress_sink<R>() -> ProgressSink<R> {
    Arc::new(|job: &Job<R>| {
        debug!(
            "Job {} state {}: {}",
            job.id,
            job.state,
            job.message.as_deref().unwrap_or("")
        );
    })
}
