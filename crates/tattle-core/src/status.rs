//! Per-record lifecycle status.

use std::fmt;
use std::str::FromStr;

use crate::error::TrackError;

/// Lifecycle of a tracked node between commits.
///
/// Unmodified moves to Modified on the first recorded difference; any
/// non-Deleted status moves to Deleted on delete. Added stays Added
/// through further edits until the record is committed (Unmodified) or
/// discarded. Deleted leaves only through rollback or removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrackStatus {
    Added,
    Unmodified,
    Modified,
    Deleted,
}

impl TrackStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackStatus::Added => "added",
            TrackStatus::Unmodified => "unmodified",
            TrackStatus::Modified => "modified",
            TrackStatus::Deleted => "deleted",
        }
    }

    /// Parse a status literal, case-insensitively.
    pub fn parse(text: &str) -> Result<TrackStatus, TrackError> {
        let all = [
            TrackStatus::Added,
            TrackStatus::Unmodified,
            TrackStatus::Modified,
            TrackStatus::Deleted,
        ];
        all.into_iter()
            .find(|status| text.eq_ignore_ascii_case(status.as_str()))
            .ok_or_else(|| TrackError::InvalidStatus(text.to_owned()))
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackStatus {
    type Err = TrackError;

    fn from_str(text: &str) -> Result<TrackStatus, TrackError> {
        TrackStatus::parse(text)
    }
}
