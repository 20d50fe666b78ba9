//! Beat <-> seconds conversion.
//!
//! Extraction works purely in beats; conversion happens once, right before
//! dispatch, so a tempo change mid-stream only affects what has not been sent yet.

use beatline_shared::MidiGlobalClipEvent;

/// Floor applied to the tempo before dividing by it.
pub const MIN_BPM: f64 = 1e-6;

#[inline]
fn safe_bpm(bpm: f64) -> f64 {
    if bpm.is_nan() { MIN_BPM } else { bpm.max(MIN_BPM) }
}

#[inline]
pub fn beats_to_seconds(beats: f64, bpm: f64) -> f64 {
    beats * (60.0 / safe_bpm(bpm))
}

#[inline]
pub fn seconds_to_beats(seconds: f64, bpm: f64) -> f64 {
    seconds * (safe_bpm(bpm) / 60.0)
}

/// Alias kept for readability at call sites that talk about "applying" a tempo.
#[inline]
pub fn apply_bpm(beats: f64, bpm: f64) -> f64 {
    beats_to_seconds(beats, bpm)
}

/// Convert `start_time`/`end_time` of every event to seconds. Ids and notes are untouched.
pub fn apply_bpm_to_events(events: &[MidiGlobalClipEvent], bpm: f64) -> Vec<MidiGlobalClipEvent> {
    events
        .iter()
        .map(|e| MidiGlobalClipEvent {
            start_time: apply_bpm(e.start_time, bpm),
            end_time: apply_bpm(e.end_time, bpm),
            ..*e
        })
        .collect()
}
