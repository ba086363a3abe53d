//! Usage errors for the tracker's public operations.
//!
//! These surface programmer misuse immediately and are never retried.
//! Failures on the evaluation path (aliased containers, structural
//! drift) are absorbed per-property by the evaluator instead and never
//! appear here.

use tattle_value::ValueKind;

use crate::status::TrackStatus;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackError {
    #[error("only objects can be tracked, got {kind}")]
    NotAnObject { kind: ValueKind },
    #[error("object reference is already tracked")]
    AlreadyTracked,
    #[error("unknown status literal `{0}`")]
    InvalidStatus(String),
    #[error("objects cannot enter tracking as {0}")]
    InvalidInitialStatus(TrackStatus),
    #[error("object reference is not tracked")]
    NotTracked,
    #[error("listener is not subscribed")]
    NotSubscribed,
}
