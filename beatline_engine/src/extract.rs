//! Clip reading: range extraction across loop laps, and sustain recovery.
//!
//! Both readers are pure. Output order is extraction order (lap by lap, clip event
//! order inside a lap), not time order.

use beatline_shared::precise::{self, MAX_BEAT_VALUE};
use beatline_shared::{MidiClip, MidiClipEvent, MidiGlobalClipEvent, MidiRange};
use log::warn;

/// Upper bound on laps serviced by a single read.
pub const DEFAULT_MAX_LAPS: usize = 4096;

#[inline]
fn scaled(value: f64, rate: f64) -> f64 {
    precise::round(value * rate)
}

/// Effective loop length, or `None` when it is not positive or not representable.
fn loop_length(clip: &MidiClip, rate: f64) -> Option<f64> {
    let raw = clip.length * rate;
    if !(raw > 0.0 && raw <= MAX_BEAT_VALUE) {
        return None;
    }
    Some(precise::round(raw)).filter(|length| *length > 0.0)
}

/// Event reader with a configurable lap cap. A clip length close to zero would
/// otherwise turn one look-ahead window into an unbounded number of laps.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    pub max_laps: usize,
}

impl Default for Extractor {
    fn default() -> Self {
        Self { max_laps: DEFAULT_MAX_LAPS }
    }
}

impl Extractor {
    pub fn new(max_laps: usize) -> Self {
        Self { max_laps: max_laps.max(1) }
    }

    /// Events of `clip` whose onsets fall in `range`, times relative to `range.start()`.
    ///
    /// `rate` stretches the clip (2.0 = half speed) without copying it. With
    /// `restart_beat`, notes already sounding at that song beat are appended.
    pub fn get_events(
        &self,
        clip: &MidiClip,
        range: &MidiRange,
        rate: f64,
        restart_beat: Option<f64>,
    ) -> Vec<MidiGlobalClipEvent> {
        let mut events = Vec::new();
        let Some(loop_length) = loop_length(clip, rate) else {
            return events;
        };

        if clip.looping {
            self.read_laps(clip, range, rate, loop_length, &mut events);
        } else if let Some(window) = range.truncate_to(loop_length) {
            // A one-shot clip lives in song space: nothing past its first lap.
            read_window(clip, &window, rate, loop_length, 0.0, &mut events);
        }

        if let Some(beat) = restart_beat {
            events.extend(get_events_playing_at_time(clip, beat, rate));
        }
        events
    }

    fn read_laps(
        &self,
        clip: &MidiClip,
        range: &MidiRange,
        rate: f64,
        loop_length: f64,
        out: &mut Vec<MidiGlobalClipEvent>,
    ) {
        let Ok(mut lap) = range.normalize(loop_length) else {
            return;
        };
        let mut offset = 0.0;

        for _ in 0..self.max_laps {
            let (head, tail) = lap.split_at_boundary(loop_length);
            read_window(clip, &head, rate, loop_length, offset, out);
            match tail {
                Some(next) => {
                    offset = precise::add(offset, head.length());
                    lap = next;
                }
                None => return,
            }
        }

        warn!(
            "read of {} beats over a {} beat loop hit the {} lap cap; remaining laps skipped",
            range.length(),
            loop_length,
            self.max_laps
        );
    }
}

/// Collect events from a window that lies inside one lap.
fn read_window(
    clip: &MidiClip,
    window: &MidiRange,
    rate: f64,
    loop_length: f64,
    offset: f64,
    out: &mut Vec<MidiGlobalClipEvent>,
) {
    let start = window.start();
    let end = window.end();
    let zero_length = window.is_empty();

    for event in clip.events() {
        let event_start = scaled(event.start_beat, rate);
        let hit = if zero_length {
            // Still catch a note beginning exactly at the read position
            event_start == start
        } else {
            event_start >= start && event_start < end
        };
        if !hit {
            continue;
        }

        let start_time = precise::add(precise::subtract(event_start, start), offset);
        let duration = clipped_duration(event, event_start, rate, loop_length);
        out.push(MidiGlobalClipEvent {
            id: event.id,
            note: event.note,
            start_time,
            end_time: precise::add(start_time, duration),
        });
    }
}

/// Scaled duration, cut so the note never runs past the loop end.
fn clipped_duration(event: &MidiClipEvent, event_start: f64, rate: f64, loop_length: f64) -> f64 {
    scaled(event.duration_beats, rate).min(precise::subtract(loop_length, event_start))
}

/// Notes that started before `song_beat` and are still sounding at it.
///
/// Onsets exactly at `song_beat` are excluded; the range reader picks those up.
/// Every result has `start_time = 0` and a strictly positive `end_time`.
pub fn get_events_playing_at_time(
    clip: &MidiClip,
    song_beat: f64,
    rate: f64,
) -> Vec<MidiGlobalClipEvent> {
    let Some(loop_length) = loop_length(clip, rate) else {
        return Vec::new();
    };
    let clip_beat = if clip.looping {
        precise::modulus(song_beat, loop_length)
    } else {
        precise::round(song_beat)
    };

    clip.events()
        .iter()
        .filter_map(|event| {
            let event_start = scaled(event.start_beat, rate);
            let duration = scaled(event.duration_beats, rate);
            if !(event_start < clip_beat && precise::add(event_start, duration) > clip_beat) {
                return None;
            }
            let elapsed = precise::subtract(clip_beat, event_start);
            let remaining = precise::subtract(duration, elapsed)
                .min(precise::subtract(loop_length, clip_beat));
            (remaining > 0.0).then_some(MidiGlobalClipEvent {
                id: event.id,
                note: event.note,
                start_time: 0.0,
                end_time: remaining,
            })
        })
        .collect()
}

/// Extraction with the default lap cap.
pub fn get_events(
    clip: &MidiClip,
    range: &MidiRange,
    rate: f64,
    restart_beat: Option<f64>,
) -> Vec<MidiGlobalClipEvent> {
    Extractor::default().get_events(clip, range, rate, restart_beat)
}
