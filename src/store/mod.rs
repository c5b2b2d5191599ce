//! Persistence contract for job records, with backend implementations.
//!
//! The scheduler and executors never hold on to a job: every read goes
//! through a [`JobStore`] and every mutation is written back through it.
//! The reference [`InMemoryJobStore`] keeps everything in a concurrent map;
//! the sqlite backend (behind the `sqlite` cargo feature) persists records
//! durably with identical filter and ordering semantics.

use async_trait::async_trait;

use crate::{
    Result,
    job::{Job, JobId},
};

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryJobStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteJobStore;

/// Storage contract for job records.
///
/// Implementations must be safe under concurrent access from the single
/// scheduler task and many executor tasks: concurrent operations on
/// different ids, and concurrent reads of the same id, may interleave
/// freely. In practice each id has a single writer at a time (the
/// scheduler/executor pairing responsible for it, or a `cancel` call).
#[async_trait]
pub trait JobStore<R>: Send + Sync {
    /// Persist the job. When `job.id` is unset (zero or below) the store
    /// assigns the next unique positive id and writes it back into the
    /// record before upserting; otherwise the job is upserted by id.
    async fn save(&self, job: &mut Job<R>) -> Result<()>;

    /// Fetch a job by id, or `None` when absent.
    async fn get(&self, id: JobId) -> Result<Option<Job<R>>>;

    /// Remove a job. Deleting a missing id is not an error.
    async fn delete(&self, id: JobId) -> Result<()>;

    /// All jobs, ordered by id descending (most recently created first).
    async fn get_all(&self) -> Result<Vec<Job<R>>>;

    /// Jobs eligible for dispatch right now: `state == Init`, with no
    /// scheduled time or one that has passed, excluding heavyweight jobs
    /// unless `include_heavy_weight`. Ordered by id descending.
    async fn get_for_running_now(&self, include_heavy_weight: bool) -> Result<Vec<Job<R>>>;

    /// Total number of stored jobs.
    async fn count(&self) -> Result<u64>;
}
