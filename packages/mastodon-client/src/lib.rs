//! Pure Mastodon REST API client.
//!
//! A minimal client for Mastodon-compatible instances, covering exactly what
//! the observatory poller needs: fetching pages of the public timeline by
//! `since_id` cursor.
//!
//! # Example
//!
//! ```rust,ignore
//! use mastodon_client::{MastodonClient, TimelineQuery};
//!
//! let client = MastodonClient::new("https://mastodon.social".parse()?, token);
//!
//! let page = client
//!     .public_timeline(&TimelineQuery::newer_than(None, 40))
//!     .await?;
//! for status in &page {
//!     println!("{}", status.id);
//! }
//! ```

pub mod error;
pub mod types;

pub use error::{FeedError, Result};
pub use types::{Status, StatusId, TimelineQuery};

use std::sync::RwLock;

use reqwest::StatusCode;
use url::Url;

const TIMELINE_PATH: &str = "api/v1/timelines/public";

pub struct MastodonClient {
    client: reqwest::Client,
    base_url: Url,
    token: RwLock<String>,
}

impl MastodonClient {
    pub fn new(base_url: Url, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            token: RwLock::new(token),
        }
    }

    /// The instance origin this client is scoped to.
    pub fn origin(&self) -> &Url {
        &self.base_url
    }

    /// Replace the bearer token after a credential refresh.
    pub fn set_token(&self, token: String) {
        // Lock is uncontended: the poller is strictly sequential.
        *self.token.write().expect("token lock poisoned") = token;
    }

    /// Fetch one page of the public timeline.
    ///
    /// Statuses are returned oldest-first regardless of server ordering, so
    /// the last element of a non-empty page is always the new cursor value.
    pub async fn public_timeline(&self, query: &TimelineQuery) -> Result<Vec<Status>> {
        let mut url = self
            .base_url
            .join(TIMELINE_PATH)
            .map_err(|e| FeedError::Malformed(format!("invalid timeline url: {e}")))?;
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("limit", &query.limit.to_string());
            if let Some(since_id) = query.since_id {
                params.append_pair("since_id", &since_id.to_string());
            }
            if let Some(max_id) = query.max_id {
                params.append_pair("max_id", &max_id.to_string());
            }
            if let Some(min_id) = query.min_id {
                params.append_pair("min_id", &min_id.to_string());
            }
        }

        let token = self.token.read().expect("token lock poisoned").clone();
        let resp = self.client.get(url).bearer_auth(token).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            return Err(error_for_status(status, retry_after, body));
        }

        let body = resp.text().await?;
        let page = parse_page(&body)?;
        tracing::debug!(
            count = page.len(),
            since_id = ?query.since_id,
            "Fetched timeline page"
        );
        Ok(page)
    }
}

/// Map a non-success HTTP status to the feed error taxonomy.
fn error_for_status(status: StatusCode, retry_after: Option<u64>, body: String) -> FeedError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FeedError::Auth {
            status: status.as_u16(),
            message: body,
        },
        StatusCode::TOO_MANY_REQUESTS => FeedError::RateLimited { retry_after },
        _ => FeedError::Api {
            status: status.as_u16(),
            message: body,
        },
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Parse a timeline response body into statuses, sorted ascending by id.
fn parse_page(body: &str) -> Result<Vec<Status>> {
    let values: Vec<serde_json::Value> = serde_json::from_str(body)
        .map_err(|e| FeedError::Malformed(format!("timeline page is not a json array: {e}")))?;

    let mut page = values
        .into_iter()
        .map(Status::from_value)
        .collect::<Result<Vec<_>>>()?;
    page.sort_by_key(|s| s.id);
    Ok(page)
}
