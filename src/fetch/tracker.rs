use chrono::{DateTime, Utc};

/// Remembers the `Last-Modified` time of the newest feed we accepted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LastModifiedTracker {
    last_updated: Option<DateTime<Utc>>,
}

impl LastModifiedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// `true` when `last_modified` is strictly later than the stored time, or
    /// nothing has been stored yet.
    pub fn is_newer(&self, last_modified: DateTime<Utc>) -> bool {
        self.last_updated.is_none_or(|seen| last_modified > seen)
    }

    /// Moves the stored time forward. Older values are ignored.
    pub fn advance(&mut self, last_modified: DateTime<Utc>) {
        if self.is_newer(last_modified) {
            self.last_updated = Some(last_modified);
        }
    }
}
