//! Animation error types

use crate::playable::Direction;
use thiserror::Error;

/// Errors returned by playable construction and control
///
/// Every variant is a usage or construction error: the call that returns it
/// has not changed any state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// `play` while already playing in the same direction
    #[error("playable is already playing {0:?}")]
    AlreadyPlaying(Direction),

    /// `pause` while not playing
    #[error("playable is not playing")]
    NotPlaying,

    /// `reset` while already reset
    #[error("playable is already reset")]
    AlreadyReset,

    /// `play` on a completed playable with `reset_if_completed == false`
    #[error("playable has completed and was not allowed to reset")]
    AlreadyCompleted,

    /// Control call made while the playable (or a sequence containing it)
    /// is evaluating, e.g. from inside one of its own phase listeners
    #[error("playable is locked while evaluating")]
    Locked,

    /// Driver control of a playable that belongs to a sequence
    #[error("playable is owned by a sequence and is driven through it")]
    Owned,

    /// The owner scope was deactivated
    #[error("owner scope is no longer active")]
    InactiveOwner,

    /// The scheduler behind the execution context was dropped
    #[error("scheduler is no longer alive")]
    DriverGone,

    /// Negative or non-finite duration
    #[error("duration must be finite and non-negative, got {0}")]
    InvalidDuration(f32),

    /// Loop count below one
    #[error("loop count must be at least 1")]
    InvalidLoopCount,

    /// Non-finite time passed to a seek or insertion
    #[error("time must be finite, got {0}")]
    InvalidTime(f32),

    /// Tween built without a `from` or `to` endpoint
    #[error("tween is missing its `{0}` endpoint")]
    MissingEndpoint(&'static str),

    /// A sequence inserted into itself
    #[error("a sequence cannot contain itself")]
    SelfContainment,

    /// A sequence inserted into one of its own descendants
    #[error("inserting this playable would create a containment cycle")]
    CyclicContainment,

    /// The playable already belongs to a sequence
    #[error("playable already belongs to a sequence")]
    AlreadyOwned,

    /// The playable is being driven by the scheduler
    #[error("playable is playing or paused and cannot be adopted by a sequence")]
    Busy,

    /// No element with this id in the sequence
    #[error("sequence has no element {0}")]
    UnknownElement(u64),
}

/// Result type for animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;
