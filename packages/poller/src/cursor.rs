use mastodon_client::StatusId;

use crate::storage::{StatusStore, StoreError};

/// Last-seen status id for the active run.
///
/// Resolved once from storage at startup and advanced only after a page has
/// been durably persisted, so a crash or failed page simply re-fetches from
/// the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorTracker {
    current: Option<StatusId>,
}

impl CursorTracker {
    pub fn new(initial: Option<StatusId>) -> Self {
        Self { current: initial }
    }

    /// Derive the cursor from the most recent persisted status for `run_id`.
    /// A fresh run has no cursor and fetches from the feed's current head.
    pub async fn resolve<S: StatusStore + ?Sized>(
        store: &S,
        run_id: &str,
    ) -> Result<Self, StoreError> {
        let current = store.latest_status_id(run_id).await?;
        match current {
            Some(id) => tracing::info!(run_id, cursor = %id, "Resuming from persisted cursor"),
            None => tracing::info!(run_id, "Fresh run, no persisted cursor"),
        }
        Ok(Self { current })
    }

    pub fn get(&self) -> Option<StatusId> {
        self.current
    }

    /// Advance to `new_max`. Strictly monotonic: a backward move is clamped
    /// to the current cursor and logged, never applied.
    pub fn advance(&mut self, new_max: StatusId) -> StatusId {
        match self.current {
            Some(current) if new_max < current => {
                tracing::warn!(
                    cursor = %current,
                    rejected = %new_max,
                    "Refusing to move cursor backward"
                );
                current
            }
            _ => {
                self.current = Some(new_max);
                new_max
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_absent_for_fresh_run() {
        let cursor = CursorTracker::new(None);
        assert_eq!(cursor.get(), None);
    }

    #[test]
    fn advances_forward() {
        let mut cursor = CursorTracker::new(None);
        assert_eq!(cursor.advance(StatusId(102)), StatusId(102));
        assert_eq!(cursor.advance(StatusId(104)), StatusId(104));
        assert_eq!(cursor.get(), Some(StatusId(104)));
    }

    #[test]
    fn clamps_backward_moves() {
        let mut cursor = CursorTracker::new(Some(StatusId(500)));
        assert_eq!(cursor.advance(StatusId(104)), StatusId(500));
        assert_eq!(cursor.get(), Some(StatusId(500)));
    }

    #[test]
    fn advancing_to_same_id_is_a_no_op() {
        let mut cursor = CursorTracker::new(Some(StatusId(7)));
        assert_eq!(cursor.advance(StatusId(7)), StatusId(7));
        assert_eq!(cursor.get(), Some(StatusId(7)));
    }
}
