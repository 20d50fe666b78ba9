use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClipError;
use crate::precise::{self, MAX_BEAT_VALUE};
use crate::Note;

/// Note value of a rest placeholder. Never scheduled as sound.
pub const REST_NOTE: Note = -1;

/// A single note inside a clip, in clip-local beats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidiClipEvent {
    pub id: Uuid,
    pub start_beat: f64,
    pub duration_beats: f64,
    pub note: Note,
}

impl MidiClipEvent {
    pub fn new(start_beat: f64, duration_beats: f64, note: Note) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_beat: precise::round(start_beat),
            duration_beats: precise::round(duration_beats),
            note,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.note == REST_NOTE
    }
}

/// Loopable container of note events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawClip")]
pub struct MidiClip {
    /// Length in beats. `<= 0` means the clip has nothing to play.
    pub length: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
    events: Vec<MidiClipEvent>,
}

#[derive(Deserialize)]
struct RawClip {
    length: f64,
    #[serde(rename = "loop")]
    looping: bool,
    #[serde(default)]
    events: Vec<MidiClipEvent>,
}

impl TryFrom<RawClip> for MidiClip {
    type Error = ClipError;

    fn try_from(raw: RawClip) -> Result<Self, Self::Error> {
        MidiClip::with_events(raw.length, raw.looping, raw.events)
    }
}

fn checked_length(length: f64) -> Result<f64, ClipError> {
    if length.is_finite() && length.abs() <= MAX_BEAT_VALUE {
        Ok(precise::round(length))
    } else {
        Err(ClipError::InvalidLength(length))
    }
}

impl Default for MidiClip {
    fn default() -> Self {
        Self {
            length: 4.0,
            looping: true,
            events: Vec::new(),
        }
    }
}

impl MidiClip {
    /// A length that is not finite or lies beyond `MAX_BEAT_VALUE` is kept as given
    /// and leaves the clip unplayable. Use [`MidiClip::with_events`] to reject it.
    pub fn new(length: f64, looping: bool) -> Self {
        Self {
            length: checked_length(length).unwrap_or(length),
            looping,
            events: Vec::new(),
        }
    }

    /// Build a clip from a complete event list, validating every event.
    pub fn with_events(
        length: f64,
        looping: bool,
        events: impl IntoIterator<Item = MidiClipEvent>,
    ) -> Result<Self, ClipError> {
        let mut clip = Self::new(checked_length(length)?, looping);
        for event in events {
            clip.push_event(event)?;
        }
        Ok(clip)
    }

    pub fn push_event(&mut self, event: MidiClipEvent) -> Result<(), ClipError> {
        if event.start_beat < 0.0 || event.start_beat >= self.length {
            return Err(ClipError::StartOutOfClip {
                start: event.start_beat,
                length: self.length,
            });
        }
        if !(event.duration_beats > 0.0) {
            return Err(ClipError::NonPositiveDuration(event.duration_beats));
        }
        if event.duration_beats > MAX_BEAT_VALUE {
            return Err(ClipError::DurationOutOfRange(event.duration_beats));
        }
        self.events.push(event);
        Ok(())
    }

    /// Swap the whole event collection. Events are never edited in place.
    pub fn replace_events(
        &mut self,
        events: impl IntoIterator<Item = MidiClipEvent>,
    ) -> Result<(), ClipError> {
        let replacement = Self::with_events(self.length, self.looping, events)?;
        self.events = replacement.events;
        Ok(())
    }

    pub fn events(&self) -> &[MidiClipEvent] {
        &self.events
    }

    pub fn is_playable(&self) -> bool {
        self.length > 0.0 && self.length <= MAX_BEAT_VALUE
    }
}

/// An extracted note, positioned relative to the start of the read window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidiGlobalClipEvent {
    pub id: Uuid,
    pub note: Note,
    pub start_time: f64,
    pub end_time: f64,
}

impl MidiGlobalClipEvent {
    pub fn is_rest(&self) -> bool {
        self.note == REST_NOTE
    }
}
