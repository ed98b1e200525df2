use async_trait::async_trait;
use mastodon_client::{Status, StatusId};

pub mod postgres;
pub use postgres::PostgresStatusStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable, idempotent sink for fetched statuses.
///
/// The run loop relies on at-least-once delivery: a page that failed to
/// persist is re-fetched from the same cursor and written again, so writes
/// must be keyed on status id and safe to repeat.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Upsert a whole page, stamping `run_id` and the ingestion timestamp on
    /// every record. All-or-nothing: on error, no item from the page may be
    /// visible as newly persisted. Returns the number of records written.
    async fn upsert_page(&self, statuses: &[Status], run_id: &str) -> Result<u64, StoreError>;

    /// Highest persisted status id for the run, if any.
    async fn latest_status_id(&self, run_id: &str) -> Result<Option<StatusId>, StoreError>;
}

#[async_trait]
impl<T: StatusStore + ?Sized> StatusStore for std::sync::Arc<T> {
    async fn upsert_page(&self, statuses: &[Status], run_id: &str) -> Result<u64, StoreError> {
        (**self).upsert_page(statuses, run_id).await
    }

    async fn latest_status_id(&self, run_id: &str) -> Result<Option<StatusId>, StoreError> {
        (**self).latest_status_id(run_id).await
    }
}
