//! # jobforge
//!
//! An in-process, Tokio-based job scheduler: jobs are admitted with optional
//! scheduled start times, run concurrently under an admission-control limit
//! for heavyweight jobs, tracked through a small lifecycle state machine,
//! and cancelable cooperatively.
//!
//! ## Features
//!
//! - **Scheduled starts**: a job with a `scheduled_time` is not dispatched
//!   before that instant; polling cadence is coarse (5 s by default)
//! - **Heavyweight admission control**: jobs flagged heavyweight share a
//!   fixed number of slots, defaulting to the host's available parallelism
//! - **Lifecycle tracking**: `Init -> Waiting -> Running -> {Successful,
//!   Failed, Canceled}`, with start/end times and cumulative duration
//! - **Cooperative cancellation**: `cancel` flips the stored state and fires
//!   a per-job cancellation token; bodies observe it and exit promptly
//! - **Pluggable persistence**: an in-memory store by default, a durable
//!   SQLite store behind the `sqlite` feature, or your own [`JobStore`]
//! - **Typed results**: a job body produces an `Option<R>` recorded on the
//!   job after successful completion
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jobforge::{Job, JobManager, ManagerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> jobforge::Result<()> {
//!     // An in-memory store and debug-log progress sink by default.
//!     let manager: JobManager<u64> = JobManager::start(ManagerConfig::new());
//!
//!     let job = Job::new(
//!         "sum",
//!         Arc::new(|_ctx| Box::pin(async { Ok(Some(1 + 2)) })),
//!     )
//!     .as_cancelable();
//!
//!     let id = manager.add(job).await?;
//!
//!     // The poll loop picks the job up, runs it, and records the result.
//!     tokio::time::sleep(std::time::Duration::from_secs(6)).await;
//!     let done = manager.store().get(id).await?.expect("job exists");
//!     assert_eq!(done.result, Some(3));
//!
//!     manager.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Cancellation contract
//!
//! Cancellation is cooperative. A body receives a [`RunContext`] and is
//! expected to check [`RunContext::is_canceled`] or await
//! [`RunContext::canceled`] at convenient points:
//!
//! ```rust
//! use jobforge::{JobBody, RunContext};
//! use std::sync::Arc;
//!
//! let body: JobBody<()> = Arc::new(|ctx: RunContext| {
//!     Box::pin(async move {
//!         tokio::select! {
//!             _ = ctx.canceled() => {}
//!             _ = tokio::time::sleep(std::time::Duration::from_secs(60)) => {}
//!         }
//!         Ok(None)
//!     })
//! });
//! ```
//!
//! This is a single-process, single-scheduler design: one poll task per
//! manager, one scheduling authority per store instance. Distributed
//! scheduling and priority ordering are out of scope.

pub mod admission;
pub mod config;
pub mod error;
pub mod job;
pub mod manager;
pub mod registry;
pub mod store;

pub use admission::AdmissionController;
pub use config::{DEFAULT_POLL_INTERVAL, DEFAULT_SHUTDOWN_GRACE, ManagerConfig, ProgressSink};
pub use error::JobForgeError;
pub use job::{Job, JobBody, JobId, JobState, RunContext};
pub use manager::{JobManager, ShutdownStatus};
pub use registry::ExecutionRegistry;
pub use store::{InMemoryJobStore, JobStore};

#[cfg(feature = "sqlite")]
pub use store::SqliteJobStore;

/// Convenient type alias for Results with [`JobForgeError`] as the error type.
pub type Result<T> = std::result::Result<T, JobForgeError>;
