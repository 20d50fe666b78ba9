use serde::{Deserialize, Serialize};

use crate::{precise, NodeId};

/// One on/off span inside a group lane, in beats relative to the pattern start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupEvent {
    pub start_beat: f64,
    pub length: f64,
    pub on: bool,
}

impl GroupEvent {
    pub fn covers(&self, position: f64) -> bool {
        self.start_beat <= position && position < precise::add(self.start_beat, self.length)
    }
}

/// A lane of gate events. A connection picks one lane by port index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub events: Vec<GroupEvent>,
}

/// Upstream on/off pattern that mutes or unmutes connected sequencers per slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPattern {
    pub id: NodeId,
    pub name: String,
    /// Total pattern length in beats
    pub length: f64,
    /// Slot size in beats; gate lookups are quantized down to a slot boundary
    pub group_event_beat_length: f64,
    pub groups: Vec<Group>,
    pub enabled: bool,
    pub playing: bool,
}

impl GroupPattern {
    pub fn new(
        name: impl Into<String>,
        length: f64,
        group_event_beat_length: f64,
        lanes: usize,
    ) -> Self {
        Self {
            id: NodeId::new_v4(),
            name: name.into(),
            length: precise::round(length),
            group_event_beat_length: precise::round(group_event_beat_length),
            groups: vec![Group::default(); lanes],
            enabled: true,
            playing: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.playing
    }

    /// Slot start (pattern-local) that contains song position `beat`.
    pub fn slot_at(&self, beat: f64) -> f64 {
        let position = precise::modulus(beat, self.length);
        // Slots below the fixed precision (or non-positive) leave the position unquantized
        let slot = precise::key(self.group_event_beat_length);
        if slot > 0 {
            let index = precise::key(position) / slot;
            precise::from_key(index * slot)
        } else {
            position
        }
    }

    /// Whether the lane at `port` has an `on` event covering `beat`.
    /// Ignores the pattern's own enabled/playing state.
    pub fn lane_open_at(&self, port: usize, beat: f64) -> bool {
        if !(self.length > 0.0) {
            return false;
        }
        let Some(group) = self.groups.get(port) else {
            return false;
        };
        let slot = self.slot_at(beat);
        group.events.iter().any(|e| e.on && e.covers(slot))
    }
}
