//! Contract tests for the SQLite-backed job store. Mirrors the in-memory
//! store suite so both backends keep identical semantics.

use chrono::Utc;
use jobforge::{Job, JobBody, JobForgeError, JobState, JobStore, RunContext, SqliteJobStore};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn noop_body() -> JobBody<String> {
    Arc::new(|_ctx| Box::pin(async { Ok(None) }))
}

fn job(name: &str) -> Job<String> {
    Job::new(name, noop_body())
}

async fn fresh_store() -> SqliteJobStore<String> {
    // A single connection keeps the in-memory database alive and shared.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteJobStore::new(pool);
    store.create_table().await.unwrap();
    store
}

#[tokio::test]
async fn test_save_assigns_positive_increasing_ids() {
    let store = fresh_store().await;

    let mut first = job("first");
    let mut second = job("second");
    store.save(&mut first).await.unwrap();
    store.save(&mut second).await.unwrap();

    assert!(first.id > 0);
    assert!(second.id > first.id);
}

#[tokio::test]
async fn test_round_trip_preserves_fields() {
    let store = fresh_store().await;

    let scheduled = Utc::now() + chrono::Duration::seconds(90);
    let mut saved = job("full record")
        .with_description("every column populated")
        .as_heavy_weight()
        .as_cancelable()
        .with_scheduled_time(scheduled);
    saved.message = Some("freshly created".to_string());
    saved.duration = Some(std::time::Duration::from_millis(1500));
    saved.result = Some("payload".to_string());
    store.save(&mut saved).await.unwrap();

    let retrieved = store.get(saved.id).await.unwrap().unwrap();
    assert_eq!(retrieved.name, "full record");
    assert_eq!(
        retrieved.description.as_deref(),
        Some("every column populated")
    );
    assert!(retrieved.heavy_weight);
    assert!(retrieved.cancelable);
    assert_eq!(retrieved.message.as_deref(), Some("freshly created"));
    assert_eq!(
        retrieved.scheduled_time.unwrap().timestamp_millis(),
        scheduled.timestamp_millis()
    );
    assert_eq!(
        retrieved.duration,
        Some(std::time::Duration::from_millis(1500))
    );
    assert_eq!(retrieved.result.as_deref(), Some("payload"));
}

#[tokio::test]
async fn test_update_preserves_id() {
    let store = fresh_store().await;

    let mut saved = job("original name");
    store.save(&mut saved).await.unwrap();
    let id = saved.id;

    saved.name = "updated name".to_string();
    saved.state = JobState::Running;
    store.save(&mut saved).await.unwrap();

    assert_eq!(saved.id, id);
    let retrieved = store.get(id).await.unwrap().unwrap();
    assert_eq!(retrieved.name, "updated name");
    assert_eq!(retrieved.state, JobState::Running);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let store = fresh_store().await;

    let mut saved = job("short lived");
    store.save(&mut saved).await.unwrap();

    store.delete(saved.id).await.unwrap();
    assert!(store.get(saved.id).await.unwrap().is_none());
    assert_eq!(store.count().await.unwrap(), 0);

    // Deleting a missing id is not an error.
    store.delete(saved.id).await.unwrap();
}

#[tokio::test]
async fn test_get_all_orders_most_recent_first() {
    let store = fresh_store().await;

    for i in 0..4 {
        store.save(&mut job(&format!("job {i}"))).await.unwrap();
    }

    let all = store.get_all().await.unwrap();
    assert_eq!(all.len(), 4);
    let ids: Vec<i64> = all.iter().map(|j| j.id).collect();
    let mut sorted = ids.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(ids, sorted);
}

#[tokio::test]
async fn test_get_for_running_now_filters_and_orders() {
    let store = fresh_store().await;

    let mut overdue =
        job("overdue").with_scheduled_time(Utc::now() - chrono::Duration::seconds(60));
    store.save(&mut overdue).await.unwrap();

    let mut not_yet =
        job("not yet").with_scheduled_time(Utc::now() + chrono::Duration::seconds(60));
    store.save(&mut not_yet).await.unwrap();

    let mut running = job("already running");
    running.state = JobState::Running;
    store.save(&mut running).await.unwrap();

    let mut heavy = job("heavy").as_heavy_weight();
    store.save(&mut heavy).await.unwrap();

    let with_heavy = store.get_for_running_now(true).await.unwrap();
    let ids: Vec<i64> = with_heavy.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![heavy.id, overdue.id]);

    let without_heavy = store.get_for_running_now(false).await.unwrap();
    let ids: Vec<i64> = without_heavy.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![overdue.id]);
}

#[tokio::test]
async fn test_rehydrated_job_has_stub_body() {
    let store = fresh_store().await;

    let mut saved = job("body lost on disk");
    store.save(&mut saved).await.unwrap();

    let rehydrated = store.get(saved.id).await.unwrap().unwrap();
    let outcome =
        (rehydrated.body)(RunContext::new(rehydrated.id, CancellationToken::new())).await;
    assert!(matches!(
        outcome.unwrap_err(),
        JobForgeError::BodyMissing { id } if id == saved.id
    ));
}
