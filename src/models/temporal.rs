//! Temporal bounds for relationships.
//!
//! Spouse relationships may end (divorce, death); a relationship is
//! *active* while it has no end, or its end lies in the future.
//!
//! # Example
//!
//! ```rust
//! use kinship::models::ValidTimeRange;
//!
//! // Married from Jan 1, 2000 until Jan 1, 2010
//! let marriage = ValidTimeRange::between(946_684_800, 1_262_304_000);
//!
//! assert!(marriage.contains(1_000_000_000));
//! assert!(!marriage.is_active_at(1_300_000_000));
//! ```

use crate::current_timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open interval `[start, end)` of Unix timestamps (seconds).
///
/// `None` on either side means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ValidTimeRange {
    /// Start of validity (inclusive), None for unbounded past.
    pub start: Option<i64>,
    /// End of validity (exclusive), None for unbounded future.
    pub end: Option<i64>,
}

impl ValidTimeRange {
    /// Creates an unbounded time range (always valid).
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Creates a time range starting from a given timestamp.
    #[must_use]
    pub const fn from(start: i64) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Creates a bounded time range.
    #[must_use]
    pub const fn between(start: i64, end: i64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Checks if the given timestamp falls within this range.
    #[must_use]
    pub const fn contains(&self, timestamp: i64) -> bool {
        let after_start = match self.start {
            Some(s) => timestamp >= s,
            None => true,
        };
        let before_end = match self.end {
            Some(e) => timestamp < e,
            None => true,
        };
        after_start && before_end
    }

    /// Returns true if the range has not ended at `timestamp`.
    ///
    /// A range that has not started yet still counts as active: only the
    /// end bound decides whether a relationship is historical.
    #[must_use]
    pub const fn is_active_at(&self, timestamp: i64) -> bool {
        match self.end {
            Some(e) => e > timestamp,
            None => true,
        }
    }

    /// Returns true if the range has not ended yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active_at(current_timestamp())
    }

    /// Ends this range at the given timestamp.
    #[must_use]
    pub const fn close_at(self, end: i64) -> Self {
        Self {
            start: self.start,
            end: Some(end),
        }
    }
}

impl fmt::Display for ValidTimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (None, None) => write!(f, "[-inf, +inf)"),
            (Some(s), None) => write!(f, "[{s}, +inf)"),
            (None, Some(e)) => write!(f, "[-inf, {e})"),
            (Some(s), Some(e)) => write!(f, "[{s}, {e})"),
        }
    }
}
