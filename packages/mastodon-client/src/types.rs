use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FeedError;

/// Remote-assigned status identifier.
///
/// Mastodon serves ids as decimal strings; they are snowflake-style integers
/// that increase monotonically within an instance, which is what makes them
/// usable as both dedup key and pagination cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusId(pub i64);

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for StatusId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(StatusId)
    }
}

/// A single status from the public timeline.
///
/// `payload` is the API record verbatim; only the id is lifted out so callers
/// can key and paginate without caring about the rest of the shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub id: StatusId,
    pub payload: serde_json::Value,
}

impl Status {
    pub fn from_value(value: serde_json::Value) -> Result<Self, FeedError> {
        let id = value
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FeedError::Malformed("status record has no string `id` field".into()))?
            .parse::<StatusId>()
            .map_err(|e| FeedError::Malformed(format!("status id is not numeric: {e}")))?;
        Ok(Self { id, payload: value })
    }
}

/// Query parameters for a timeline page.
///
/// `since_id` is the lower-bound cursor used by the poller; `max_id`/`min_id`
/// are passed through for operator-driven backfill.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineQuery {
    pub limit: u32,
    pub since_id: Option<StatusId>,
    pub max_id: Option<StatusId>,
    pub min_id: Option<StatusId>,
}

impl TimelineQuery {
    pub fn newer_than(since_id: Option<StatusId>, limit: u32) -> Self {
        Self {
            limit,
            since_id,
            max_id: None,
            min_id: None,
        }
    }
}
