/// Errors from the Mastodon feed API.
///
/// The poller's retry layer classifies on these kinds: everything except
/// `Auth` is treated as transient and retried at a fixed interval.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// 401/403 — the bearer token is invalid or expired. Never retried here;
    /// the caller must refresh credentials or terminate.
    #[error("authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },

    /// 429 — the server asked us to slow down. `retry_after` carries the
    /// server's hint in seconds when it sent one.
    #[error("rate limited by server")]
    RateLimited { retry_after: Option<u64> },

    /// Transport-level failure (DNS, connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body did not parse as a timeline page.
    #[error("malformed timeline response: {0}")]
    Malformed(String),

    /// Any other non-success HTTP status.
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
}

impl FeedError {
    /// Whether the fixed-interval retry loop may attempt this again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FeedError::Auth { .. })
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
