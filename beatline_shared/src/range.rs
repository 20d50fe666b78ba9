use serde::{Deserialize, Serialize};

use crate::error::RangeError;
use crate::precise::{self, MAX_BEAT_VALUE};

/// Half-open beat interval `[start, start + length)`.
///
/// Coordinates are song-wide beats; a range may span any number of clip laps.
/// Construction validates both fields so that downstream readers never see a
/// negative or out-of-precision range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct MidiRange {
    start: f64,
    length: f64,
}

#[derive(Deserialize)]
struct RawRange {
    start: f64,
    length: f64,
}

impl TryFrom<RawRange> for MidiRange {
    type Error = RangeError;

    fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
        MidiRange::new(raw.start, raw.length)
    }
}

fn check_value(value: f64) -> Result<f64, RangeError> {
    if !value.is_finite() {
        return Err(RangeError::NotFinite);
    }
    if value.abs() > MAX_BEAT_VALUE {
        return Err(RangeError::OutOfRange(value));
    }
    Ok(precise::round(value))
}

impl MidiRange {
    pub fn new(start: f64, length: f64) -> Result<Self, RangeError> {
        let start = check_value(start)?;
        let length = check_value(length)?;
        if start < 0.0 {
            return Err(RangeError::NegativeStart(start));
        }
        if length < 0.0 {
            return Err(RangeError::NegativeLength(length));
        }
        let end = precise::add(start, length);
        if end > MAX_BEAT_VALUE {
            return Err(RangeError::OutOfRange(end));
        }
        Ok(Self { start, length })
    }

    /// Build a sub-range of an already validated range. Callers guarantee both
    /// values are non-negative and no larger than the parent's bounds.
    pub(crate) fn from_parts(start: f64, length: f64) -> Self {
        Self {
            start: precise::round(start.max(0.0)),
            length: precise::round(length.max(0.0)),
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn end(&self) -> f64 {
        precise::add(self.start, self.length)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0.0
    }

    /// Map the range onto clip-local coordinates. Only `start` wraps; `length` is
    /// kept, so the result may still extend past `clip_length`.
    pub fn normalize(&self, clip_length: f64) -> Result<Self, RangeError> {
        if !(clip_length > 0.0) {
            return Err(RangeError::InvalidClipLength(clip_length));
        }
        Ok(Self::from_parts(
            precise::modulus(self.start, clip_length),
            self.length,
        ))
    }

    /// True if the range, as given, fits inside a single lap `[0, clip_length]`.
    pub fn is_within(&self, clip_length: f64) -> bool {
        self.start < clip_length && self.length <= clip_length && self.end() <= clip_length
    }

    /// Cut the range off at `limit`. `None` if it starts at or past `limit`.
    pub fn truncate_to(&self, limit: f64) -> Option<Self> {
        if self.start >= limit {
            return None;
        }
        let end = self.end().min(limit);
        Some(Self::from_parts(self.start, precise::subtract(end, self.start)))
    }

    /// Split the range at its first clip boundary.
    ///
    /// Returns the part up to `clip_length` and, if the range crosses it, the
    /// remainder restarted at beat 0. `self` must already be normalized.
    pub fn split_at_boundary(&self, clip_length: f64) -> (Self, Option<Self>) {
        if self.is_within(clip_length) {
            return (*self, None);
        }
        let head = precise::subtract(clip_length, self.start);
        let excess = precise::subtract(self.end(), clip_length);
        let tail = (excess > 0.0).then(|| Self::from_parts(0.0, excess));
        (Self::from_parts(self.start, head), tail)
    }
}
