//! Durable job store backed by SQLite via sqlx.
//!
//! Semantics match [`InMemoryJobStore`](crate::store::InMemoryJobStore)
//! exactly: id assignment on first save, upsert by id, the runnability
//! filter, and descending-id ordering. Timestamps are stored as unix
//! milliseconds, the result payload as a JSON column. Job bodies are
//! runtime state and are not persisted; rehydrated records carry a stub
//! body that fails until a real one is re-attached.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use std::{marker::PhantomData, time::Duration};

use crate::{
    Result,
    job::{self, Job, JobId, JobState},
    store::JobStore,
};

/// SQLite-backed [`JobStore`] for jobs with result type `R`.
///
/// # Examples
///
/// ```rust,no_run
/// use jobforge::{Job, JobStore, SqliteJobStore};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store: SqliteJobStore<String> = SqliteJobStore::connect("sqlite://jobs.db").await?;
/// store.create_table().await?;
///
/// let mut job = Job::new("export", Arc::new(|_ctx| {
///     Box::pin(async { Ok(Some("done".to_string())) })
/// }));
/// store.save(&mut job).await?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteJobStore<R> {
    pool: SqlitePool,
    _result: PhantomData<fn() -> R>,
}

impl<R> SqliteJobStore<R> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _result: PhantomData,
        }
    }

    /// Connect to a SQLite database URL, e.g. `sqlite://jobs.db` or
    /// `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Create the jobs table and its polling index if they do not exist.
    pub async fn create_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                state TEXT NOT NULL,
                message TEXT,
                heavy_weight INTEGER NOT NULL DEFAULT 0,
                cancelable INTEGER NOT NULL DEFAULT 0,
                scheduled_time INTEGER,
                start_time INTEGER,
                end_time INTEGER,
                duration_ms INTEGER,
                result TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_jobs_runnable ON jobs (state, scheduled_time)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_job<R>(row: &SqliteRow) -> Result<Job<R>>
where
    R: DeserializeOwned + Send + 'static,
{
    let state: String = row.try_get("state")?;
    let result: Option<String> = row.try_get("result")?;
    let result = result
        .as_deref()
        .map(serde_json::from_str::<R>)
        .transpose()?;

    Ok(Job {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        state: state.parse()?,
        message: row.try_get("message")?,
        heavy_weight: row.try_get("heavy_weight")?,
        cancelable: row.try_get("cancelable")?,
        scheduled_time: millis_to_instant(row.try_get("scheduled_time")?),
        start_time: millis_to_instant(row.try_get("start_time")?),
        end_time: millis_to_instant(row.try_get("end_time")?),
        duration: row
            .try_get::<Option<i64>, _>("duration_ms")?
            .map(|ms| Duration::from_millis(ms.max(0) as u64)),
        result,
        body: job::missing_body(),
    })
}

fn millis_to_instant(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

fn instant_to_millis(instant: Option<DateTime<Utc>>) -> Option<i64> {
    instant.map(|t| t.timestamp_millis())
}

#[async_trait]
impl<R> JobStore<R> for SqliteJobStore<R>
where
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn save(&self, job: &mut Job<R>) -> Result<()> {
        let result_json = job
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let duration_ms = job.duration.map(|d| d.as_millis() as i64);

        if job.id <= 0 {
            let inserted = sqlx::query(
                r#"
                INSERT INTO jobs (name, description, state, message, heavy_weight,
                                  cancelable, scheduled_time, start_time, end_time,
                                  duration_ms, result)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&job.name)
            .bind(&job.description)
            .bind(job.state.as_str())
            .bind(&job.message)
            .bind(job.heavy_weight)
            .bind(job.cancelable)
            .bind(instant_to_millis(job.scheduled_time))
            .bind(instant_to_millis(job.start_time))
            .bind(instant_to_millis(job.end_time))
            .bind(duration_ms)
            .bind(result_json)
            .execute(&self.pool)
            .await?;

            job.id = inserted.last_insert_rowid();
        } else {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO jobs (id, name, description, state, message,
                                             heavy_weight, cancelable, scheduled_time,
                                             start_time, end_time, duration_ms, result)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(job.id)
            .bind(&job.name)
            .bind(&job.description)
            .bind(job.state.as_str())
            .bind(&job.message)
            .bind(job.heavy_weight)
            .bind(job.cancelable)
            .bind(instant_to_millis(job.scheduled_time))
            .bind(instant_to_millis(job.start_time))
            .bind(instant_to_millis(job.end_time))
            .bind(duration_ms)
            .bind(result_json)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<Job<R>>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_job).transpose()
    }

    async fn delete(&self, id: JobId) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Job<R>>> {
        let rows = sqlx::query("SELECT * FROM jobs ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_job).collect()
    }

    async fn get_for_running_now(&self, include_heavy_weight: bool) -> Result<Vec<Job<R>>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM jobs
            WHERE state = ?
              AND (scheduled_time IS NULL OR scheduled_time <= ?)
              AND (heavy_weight = 0 OR ?)
            ORDER BY id DESC
            "#,
        )
        .bind(JobState::Init.as_str())
        .bind(Utc::now().timestamp_millis())
        .bind(include_heavy_weight)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_job).collect()
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM jobs")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }
}
