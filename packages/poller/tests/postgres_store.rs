//! Integration tests for the Postgres sink against a real database.
//!
//! Run with `cargo test -- --ignored`; requires a local Docker daemon.

use mastodon_client::{Status, StatusId};
use observatory_poller::{PostgresStatusStore, StatusStore};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

fn status(id: i64, content: &str) -> Status {
    Status {
        id: StatusId(id),
        payload: json!({ "id": id.to_string(), "content": content }),
    }
}

async fn store_with_container() -> (ContainerAsync<Postgres>, PgPool, PostgresStatusStore) {
    let postgres = Postgres::default()
        .start()
        .await
        .expect("Failed to start Postgres container");

    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();
    let db_url = format!("postgresql://postgres:postgres@{host}:{port}/postgres");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&db_url)
        .await
        .expect("Failed to connect to Postgres");

    let store = PostgresStatusStore::new(pool.clone(), "mastodon_statuses");
    store.ensure_schema().await.expect("Failed to create schema");

    (postgres, pool, store)
}

async fn row_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM "mastodon_statuses""#)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn upsert_is_idempotent_and_refreshes_metadata() {
    let (_container, pool, store) = store_with_container().await;

    let first = store
        .upsert_page(&[status(101, "original")], "run_a")
        .await
        .unwrap();
    assert_eq!(first, 1);

    // Replaying the same id must not create a second row, and the latest
    // write's payload and run metadata must win.
    store
        .upsert_page(&[status(101, "refetched")], "run_b")
        .await
        .unwrap();

    assert_eq!(row_count(&pool).await, 1);

    let (payload, run_id): (serde_json::Value, String) = sqlx::query_as(
        r#"SELECT payload, run_id FROM "mastodon_statuses" WHERE status_id = 101"#,
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(payload["content"], "refetched");
    assert_eq!(run_id, "run_b");
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn overlapping_pages_persist_each_id_once() {
    let (_container, pool, store) = store_with_container().await;

    store
        .upsert_page(&[status(201, "a"), status(202, "b")], "run_a")
        .await
        .unwrap();
    // Replay of the same page after a simulated mid-page failure.
    store
        .upsert_page(&[status(201, "a"), status(202, "b"), status(203, "c")], "run_a")
        .await
        .unwrap();

    assert_eq!(row_count(&pool).await, 3);
    assert_eq!(
        store.latest_status_id("run_a").await.unwrap(),
        Some(StatusId(203))
    );
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
async fn latest_status_id_is_partitioned_by_run() {
    let (_container, _pool, store) = store_with_container().await;

    store
        .upsert_page(&[status(104, "x")], "run_a")
        .await
        .unwrap();
    store
        .upsert_page(&[status(500, "y")], "run_b")
        .await
        .unwrap();

    assert_eq!(
        store.latest_status_id("run_a").await.unwrap(),
        Some(StatusId(104))
    );
    assert_eq!(
        store.latest_status_id("run_b").await.unwrap(),
        Some(StatusId(500))
    );
    assert_eq!(store.latest_status_id("run_c").await.unwrap(), None);

    // ensure_schema is safe to call again on an existing table.
    store.ensure_schema().await.unwrap();
}
