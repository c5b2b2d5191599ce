//! Reference in-memory job store.

use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::HashMap,
    sync::atomic::{AtomicI64, Ordering},
};
use tokio::sync::RwLock;

use crate::{
    Result,
    job::{Job, JobId, JobState},
    store::JobStore,
};

/// In-memory [`JobStore`] backed by a concurrent id -> job map with an
/// atomically incrementing id generator.
///
/// Filtering and ordering are computed on a snapshot of the current values,
/// so readers never block writers for longer than a clone.
///
/// # Examples
///
/// ```rust
/// use jobforge::{InMemoryJobStore, Job, JobStore};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store: InMemoryJobStore<()> = InMemoryJobStore::new();
///
/// let mut job = Job::new("demo", Arc::new(|_ctx| Box::pin(async { Ok(None) })));
/// store.save(&mut job).await?;
/// assert!(job.id > 0);
/// assert_eq!(store.count().await?, 1);
/// # Ok(())
/// # }
/// ```
pub struct InMemoryJobStore<R> {
    jobs: RwLock<HashMap<JobId, Job<R>>>,
    next_id: AtomicI64,
}

impl<R> InMemoryJobStore<R> {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(0),
        }
    }
}

impl<R> Default for InMemoryJobStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R> JobStore<R> for InMemoryJobStore<R>
where
    R: Clone + Send + Sync + 'static,
{
    async fn save(&self, job: &mut Job<R>) -> Result<()> {
        if job.id <= 0 {
            job.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        }

        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<Job<R>>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(&id).cloned())
    }

    async fn delete(&self, id: JobId) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(&id);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Job<R>>> {
        let jobs = self.jobs.read().await;
        let mut all: Vec<Job<R>> = jobs.values().cloned().collect();
        all.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(all)
    }

    async fn get_for_running_now(&self, include_heavy_weight: bool) -> Result<Vec<Job<R>>> {
        let now = Utc::now();
        let jobs = self.jobs.read().await;
        let mut runnable: Vec<Job<R>> = jobs
            .values()
            .filter(|j| j.state == JobState::Init)
            .filter(|j| j.scheduled_time.is_none_or(|t| t <= now))
            .filter(|j| !j.heavy_weight || include_heavy_weight)
            .cloned()
            .collect();
        runnable.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(runnable)
    }

    async fn count(&self) -> Result<u64> {
        let jobs = self.jobs.read().await;
        Ok(jobs.len() as u64)
    }
}
