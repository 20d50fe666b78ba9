//! Error types for Beatline

use thiserror::Error;

use crate::NodeId;

/// Raised when a beat range cannot be represented losslessly.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangeError {
    #[error("start must be >= 0 (got {0})")]
    NegativeStart(f64),

    #[error("length must be >= 0 (got {0})")]
    NegativeLength(f64),

    #[error("beat value {0} exceeds the fixed-precision ceiling")]
    OutOfRange(f64),

    #[error("beat value is not finite")]
    NotFinite,

    #[error("clip length must be > 0 to normalize (got {0})")]
    InvalidClipLength(f64),
}

/// Raised when a clip event would break the clip invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClipError {
    #[error("event start {start} lies outside [0, {length})")]
    StartOutOfClip { start: f64, length: f64 },

    #[error("event duration must be > 0 (got {0})")]
    NonPositiveDuration(f64),

    #[error("event duration {0} exceeds the fixed-precision ceiling")]
    DurationOutOfRange(f64),

    #[error("clip length {0} is not finite or exceeds the fixed-precision ceiling")]
    InvalidLength(f64),
}

/// Raised when the connection graph is edited inconsistently.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    #[error("cannot connect {from} to {to}: {reason}")]
    InvalidConnection {
        from: NodeId,
        to: NodeId,
        reason: &'static str,
    },

    #[error("group pattern {pattern} has no group at port {port}")]
    UnknownPort { pattern: NodeId, port: usize },
}
