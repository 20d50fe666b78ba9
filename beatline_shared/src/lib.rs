use uuid::Uuid;

pub mod clip;
pub mod error;
pub mod group;
pub mod precise;
pub mod range;

pub use clip::{MidiClip, MidiClipEvent, MidiGlobalClipEvent, REST_NOTE};
pub use error::{ClipError, RangeError, RoutingError};
pub use group::{Group, GroupEvent, GroupPattern};
pub use range::MidiRange;

/// Identifier shared by every connectable node (sequencers, group patterns, instruments)
/// and by clip events.
pub type NodeId = Uuid;

/// Note number as stored in clips. `REST_NOTE` (-1) marks a silent placeholder.
pub type Note = i8;

/// Beats per minute used when nothing else is configured
pub const DEFAULT_BPM: f64 = 120.0;
