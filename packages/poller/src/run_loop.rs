use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mastodon_client::{FeedError, MastodonClient, Status, StatusId, TimelineQuery};
use tokio::sync::watch;
use url::Url;

use crate::config::Config;
use crate::credentials::{Credential, CredentialProvider};
use crate::cursor::CursorTracker;
use crate::retry::{retry_forever, RetryError, RetryPolicy};
use crate::storage::StatusStore;

/// Feed abstraction the run loop polls (allows mocking the remote API).
#[async_trait]
pub trait TimelineSource: Send + Sync {
    /// Fetch statuses newer than `since_id`, oldest-first.
    async fn fetch_page(
        &self,
        since_id: Option<StatusId>,
        limit: u32,
    ) -> Result<Vec<Status>, FeedError>;

    /// Install a freshly issued credential after the previous one was
    /// rejected.
    fn set_credential(&self, credential: &Credential);
}

#[async_trait]
impl TimelineSource for MastodonClient {
    async fn fetch_page(
        &self,
        since_id: Option<StatusId>,
        limit: u32,
    ) -> Result<Vec<Status>, FeedError> {
        self.public_timeline(&TimelineQuery::newer_than(since_id, limit))
            .await
    }

    fn set_credential(&self, credential: &Credential) {
        self.set_token(credential.token.clone());
    }
}

#[async_trait]
impl<T: TimelineSource + ?Sized> TimelineSource for Arc<T> {
    async fn fetch_page(
        &self,
        since_id: Option<StatusId>,
        limit: u32,
    ) -> Result<Vec<Status>, FeedError> {
        (**self).fetch_page(since_id, limit).await
    }

    fn set_credential(&self, credential: &Credential) {
        (**self).set_credential(credential)
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The feed returned an empty page: nothing newer than the cursor.
    Drained,
    Terminated(TerminationCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    /// The credential was rejected and could not be refreshed.
    AuthFailed,
    /// External shutdown signal observed between cycles.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub origin: Url,
    pub run_id: String,
    pub page_size: u32,
    pub retry: RetryPolicy,
}

impl PollerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            origin: config.api_base_url.clone(),
            run_id: config.run_id.clone(),
            page_size: config.page_size,
            retry: RetryPolicy {
                interval: config.retry_interval,
            },
        }
    }
}

/// Sequential fetch → persist → advance loop over one feed.
///
/// One page in flight at a time; the cursor only moves after the page it
/// covers has been durably persisted, so every failure path degenerates to
/// re-fetching from a safe position.
pub struct Poller<C, S> {
    source: C,
    store: S,
    credentials: Arc<dyn CredentialProvider>,
    settings: PollerSettings,
    shutdown: watch::Receiver<bool>,
}

impl<C, S> Poller<C, S>
where
    C: TimelineSource,
    S: StatusStore,
{
    pub fn new(
        source: C,
        store: S,
        credentials: Arc<dyn CredentialProvider>,
        settings: PollerSettings,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            store,
            credentials,
            settings,
            shutdown,
        }
    }

    pub async fn run(self) -> Result<RunOutcome> {
        let Poller {
            source,
            store,
            credentials,
            settings,
            mut shutdown,
        } = self;
        let run_id = settings.run_id.as_str();

        let mut cursor = CursorTracker::resolve(&store, run_id)
            .await
            .context("Failed to resolve ingestion cursor from storage")?;

        // Set after a credential refresh; cleared by the next successful
        // fetch. A rejection while this is set means the fresh credential is
        // also bad, which is unrecoverable.
        let mut refreshed_credential = false;

        loop {
            let since_id = cursor.get();
            let fetched = retry_forever(settings.retry, &mut shutdown, || {
                source.fetch_page(since_id, settings.page_size)
            })
            .await;

            let page = match fetched {
                Ok(page) => {
                    refreshed_credential = false;
                    page
                }
                Err(RetryError::Cancelled) => {
                    tracing::info!(run_id, "Shutdown requested, stopping poller");
                    return Ok(RunOutcome::Terminated(TerminationCause::Shutdown));
                }
                Err(RetryError::Fatal(err)) => {
                    if refreshed_credential {
                        tracing::error!(error = %err, run_id, "Fresh credential also rejected");
                        return Ok(RunOutcome::Terminated(TerminationCause::AuthFailed));
                    }
                    tracing::warn!(error = %err, "Credential rejected, requesting a fresh one");
                    match credentials.credential(&settings.origin).await {
                        Ok(credential) => {
                            source.set_credential(&credential);
                            refreshed_credential = true;
                            continue;
                        }
                        Err(cred_err) => {
                            tracing::error!(error = %cred_err, run_id, "Credential refresh failed");
                            return Ok(RunOutcome::Terminated(TerminationCause::AuthFailed));
                        }
                    }
                }
            };

            if page.is_empty() {
                tracing::info!(run_id, cursor = ?cursor.get(), "Feed exhausted, run drained");
                return Ok(RunOutcome::Drained);
            }

            match store.upsert_page(&page, run_id).await {
                Ok(count) => {
                    tracing::info!(count, run_id, "Persisted page");
                }
                Err(err) => {
                    // Cursor stays put; the same page is re-fetched and the
                    // idempotent upsert absorbs the replay.
                    tracing::warn!(
                        error = %err,
                        run_id,
                        "Failed to persist page, re-fetching from the same cursor"
                    );
                    continue;
                }
            }

            if let Some(max_id) = page.iter().map(|s| s.id).max() {
                cursor.advance(max_id);
            }
        }
    }
}
