//! Continuous ingestion of a Mastodon public timeline into Postgres.
//!
//! The poller pulls pages of statuses newer than a persisted cursor, upserts
//! them keyed by status id, and advances the cursor only after a page is
//! durably stored. Transient feed failures are retried forever at a fixed
//! interval; only credential rejection and operator shutdown end a run.

pub mod config;
pub mod credentials;
pub mod cursor;
pub mod retry;
pub mod run_loop;
pub mod storage;

pub use config::Config;
pub use credentials::{AuthServiceProvider, Credential, CredentialProvider, StaticTokenProvider};
pub use cursor::CursorTracker;
pub use retry::{retry_forever, RetryError, RetryPolicy};
pub use run_loop::{Poller, PollerSettings, RunOutcome, TerminationCause, TimelineSource};
pub use storage::{PostgresStatusStore, StatusStore, StoreError};
