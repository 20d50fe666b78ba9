//! Look-ahead scheduler.
//!
//! One call to [`Scheduler::tick`] per display/timer tick. The tick reads every
//! active sequencer over the window between the read cursor and the look-ahead
//! horizon, gates and de-duplicates the result, and returns timed note commands.
//! All mutable state lives in [`SchedulerState`], passed in by the caller.

use std::collections::{BTreeMap, HashMap, HashSet};

use beatline_shared::precise;
use beatline_shared::{MidiGlobalClipEvent, MidiRange, NodeId};
use log::{debug, info, warn};

use crate::commands::NoteCommand;
use crate::config::SchedulerConfig;
use crate::extract::Extractor;
use crate::gate;
use crate::graph::RoutingGraph;
use crate::tempo::{apply_bpm_to_events, seconds_to_beats};
use crate::transport::TransportState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackPhase {
    #[default]
    Stopped,
    Playing,
}

/// A dispatched note whose release has not happened yet.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeldNote {
    note: u8,
    /// Absolute clock time of the scheduled NoteOff
    release_at: f64,
}

/// Everything the scheduler mutates between ticks.
#[derive(Debug, Clone, Default)]
pub struct SchedulerState {
    pub phase: PlaybackPhase,
    /// Clock time playback last started
    pub song_start_time: f64,
    pub last_tick_time: f64,
    /// Song beat up to which events have been read
    pub cursor_beats: f64,
    /// True play position derived from the clock and tempo
    pub current_song_time_beats: f64,
    /// Last transport play count seen; a change means restart
    pub play_count: u64,
    pub just_started: bool,
    pub restarted: bool,
    /// Effective loop length per active sequencer. A sequencer missing here is
    /// read for the first time and gets its held notes recovered.
    pub loop_cache: HashMap<NodeId, f64>,
    held: HashMap<NodeId, Vec<HeldNote>>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_playing(&self) -> bool {
        self.phase == PlaybackPhase::Playing
    }

    /// Notes dispatched to `instrument` and not yet released.
    pub fn held_notes(&self, instrument: NodeId) -> Vec<u8> {
        self.held
            .get(&instrument)
            .map(|notes| notes.iter().map(|h| h.note).collect())
            .unwrap_or_default()
    }

    pub fn held_count(&self) -> usize {
        self.held.values().map(Vec::len).sum()
    }

    fn prune_released(&mut self, now: f64) {
        self.held.retain(|_, notes| {
            notes.retain(|h| h.release_at > now);
            !notes.is_empty()
        });
    }

    /// Release every held note: NoteOff now, then a panic per instrument.
    fn release_all(&mut self, out: &mut Vec<NoteCommand>) {
        let held: BTreeMap<NodeId, Vec<HeldNote>> = self.held.drain().collect();
        for (instrument, notes) in held {
            for held_note in notes {
                out.push(NoteCommand::NoteOff {
                    instrument,
                    note: held_note.note,
                    delay: 0.0,
                });
            }
            out.push(NoteCommand::Panic { instrument });
        }
    }
}

/// An extracted event with the sequencers it came from.
#[derive(Debug, Clone)]
struct Collapsed {
    event: MidiGlobalClipEvent,
    sources: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    config: SchedulerConfig,
    extractor: Extractor,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            extractor: Extractor::new(config.max_laps),
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Advance one tick at clock time `now` (seconds).
    pub fn tick(
        &self,
        state: &mut SchedulerState,
        transport: &TransportState,
        graph: &RoutingGraph,
        now: f64,
    ) -> Vec<NoteCommand> {
        let mut commands = Vec::new();

        state.prune_released(now);

        if !transport.is_playing {
            if state.is_playing() {
                commands = self.stop(state, now);
            }
            return commands;
        }

        if state.is_playing() {
            self.advance(state, transport, now, &mut commands);
        } else {
            Self::start(state, transport, now);
        }

        if let Some(window) = self.read_window(state, transport) {
            self.schedule_window(state, transport, graph, &window, now, &mut commands);
            state.cursor_beats = window.end();
        }

        state.just_started = false;
        state.restarted = false;
        commands
    }

    /// Transition to stopped at clock time `now`, releasing every note still
    /// sounding. Safe to call repeatedly.
    pub fn stop(&self, state: &mut SchedulerState, now: f64) -> Vec<NoteCommand> {
        let mut commands = Vec::new();
        if state.is_playing() {
            info!("transport stopped at beat {:.3}", state.current_song_time_beats);
        }
        state.prune_released(now);
        state.release_all(&mut commands);
        state.loop_cache.clear();
        state.phase = PlaybackPhase::Stopped;
        state.just_started = false;
        state.restarted = false;
        commands
    }

    fn start(state: &mut SchedulerState, transport: &TransportState, now: f64) {
        let start_beat = precise::round(transport.start_beat.max(0.0));
        info!("transport started at beat {start_beat:.3}");
        state.phase = PlaybackPhase::Playing;
        state.song_start_time = now;
        state.last_tick_time = now;
        state.cursor_beats = start_beat;
        state.current_song_time_beats = start_beat;
        state.play_count = transport.play_count;
        state.just_started = true;
    }

    fn advance(
        &self,
        state: &mut SchedulerState,
        transport: &TransportState,
        now: f64,
        commands: &mut Vec<NoteCommand>,
    ) {
        let delta_seconds = (now - state.last_tick_time).max(0.0);
        state.last_tick_time = now;
        let delta_beats = precise::round(seconds_to_beats(delta_seconds, transport.bpm));
        state.current_song_time_beats = precise::add(state.current_song_time_beats, delta_beats);

        if transport.play_count != state.play_count {
            let start_beat = precise::round(transport.start_beat.max(0.0));
            info!(
                "transport restarted (play count {}), jumping to beat {start_beat:.3}",
                transport.play_count
            );
            state.release_all(commands);
            state.loop_cache.clear();
            state.play_count = transport.play_count;
            state.current_song_time_beats = start_beat;
            state.cursor_beats = start_beat;
            state.restarted = true;
        }
    }

    /// Window from the read cursor up to the look-ahead horizon, if non-empty.
    fn read_window(
        &self,
        state: &mut SchedulerState,
        transport: &TransportState,
    ) -> Option<MidiRange> {
        state.cursor_beats = state.cursor_beats.max(state.current_song_time_beats);

        let look_ahead = seconds_to_beats(transport.max_read_ahead_seconds.max(0.0), transport.bpm);
        let mut horizon = precise::add(state.current_song_time_beats, precise::round(look_ahead));
        if state.just_started || state.restarted {
            let margin = seconds_to_beats(self.config.jump_start_seconds, transport.bpm);
            horizon = precise::add(horizon, precise::round(margin));
        }

        let length = precise::subtract(horizon, state.cursor_beats);
        if length <= 0.0 {
            return None;
        }
        match MidiRange::new(state.cursor_beats, length) {
            Ok(window) => Some(window),
            Err(e) => {
                warn!("cannot build read window at beat {}: {e}", state.cursor_beats);
                None
            }
        }
    }

    fn schedule_window(
        &self,
        state: &mut SchedulerState,
        transport: &TransportState,
        graph: &RoutingGraph,
        window: &MidiRange,
        now: f64,
        commands: &mut Vec<NoteCommand>,
    ) {
        let discontinuity = state.just_started || state.restarted;
        debug!(
            "reading [{:.4}, {:.4}) at beat {:.4}{}",
            window.start(),
            window.end(),
            state.current_song_time_beats,
            if discontinuity { " (discontinuity)" } else { "" }
        );

        let mut audible = HashSet::new();
        let mut per_instrument: BTreeMap<NodeId, Vec<(MidiGlobalClipEvent, NodeId)>> =
            BTreeMap::new();

        for sequencer in graph.sequencers().filter(|s| s.is_active()) {
            // Unrouted sequencers stay out of the cache so wiring one later recovers its notes
            let targets = graph.instruments_for(sequencer.id);
            if targets.is_empty() {
                continue;
            }
            audible.insert(sequencer.id);

            let loop_length = sequencer.loop_length();
            let first_read = match state.loop_cache.insert(sequencer.id, loop_length) {
                None => true,
                Some(previous) => {
                    if previous != loop_length {
                        debug!(
                            "sequencer {} loop length {previous} -> {loop_length}",
                            sequencer.name
                        );
                    }
                    false
                }
            };

            let restart_beat = (discontinuity || first_read).then_some(window.start());
            let events = sequencer.read(&self.extractor, window, restart_beat);
            let events = gate::filter_events(graph, sequencer.id, window.start(), events);

            for instrument in targets {
                per_instrument
                    .entry(instrument)
                    .or_default()
                    .extend(events.iter().map(|e| (*e, sequencer.id)));
            }
        }
        state.loop_cache.retain(|id, _| audible.contains(id));

        let offset = precise::subtract(window.start(), state.current_song_time_beats);
        for (instrument, events) in per_instrument {
            let collapsed = dedupe(events);
            dispatch(state, instrument, collapsed, offset, transport.bpm, now, commands);
        }
    }
}

/// Collapse events sharing `(start_time, note)` into one, merging their sources.
/// The collapsed note keeps the later end so it is never cut short.
fn dedupe(events: Vec<(MidiGlobalClipEvent, NodeId)>) -> Vec<Collapsed> {
    let mut out: Vec<Collapsed> = Vec::with_capacity(events.len());
    let mut seen: HashMap<(i64, i8), usize> = HashMap::new();

    for (event, source) in events {
        let key = (precise::key(event.start_time), event.note);
        match seen.get(&key) {
            Some(&i) => {
                let existing = &mut out[i];
                if event.end_time > existing.event.end_time {
                    existing.event.end_time = event.end_time;
                }
                if !existing.sources.contains(&source) {
                    existing.sources.push(source);
                }
            }
            None => {
                seen.insert(key, out.len());
                out.push(Collapsed { event, sources: vec![source] });
            }
        }
    }
    out
}

/// Turn one instrument's events into commands. `offset` is the distance in beats
/// from the true play position to the window start.
fn dispatch(
    state: &mut SchedulerState,
    instrument: NodeId,
    collapsed: Vec<Collapsed>,
    offset: f64,
    bpm: f64,
    now: f64,
    out: &mut Vec<NoteCommand>,
) {
    let mut shifted = Vec::with_capacity(collapsed.len());
    let mut sources = Vec::with_capacity(collapsed.len());

    for Collapsed { event, sources: tags } in collapsed {
        if event.is_rest() {
            continue;
        }
        if event.start_time < 0.0 || event.end_time < 0.0 {
            warn!(
                "dropping note {} with negative timing ({}, {})",
                event.note, event.start_time, event.end_time
            );
            continue;
        }
        shifted.push(MidiGlobalClipEvent {
            start_time: precise::add(offset, event.start_time),
            end_time: precise::add(offset, event.end_time),
            ..event
        });
        sources.push(tags);
    }

    for (event, tags) in apply_bpm_to_events(&shifted, bpm).into_iter().zip(sources) {
        let Ok(note) = u8::try_from(event.note) else {
            warn!("dropping invalid note value {}", event.note);
            continue;
        };
        out.push(NoteCommand::NoteOn {
            instrument,
            note,
            delay: event.start_time,
            sources: tags,
        });
        out.push(NoteCommand::NoteOff {
            instrument,
            note,
            delay: event.end_time,
        });
        state.held.entry(instrument).or_default().push(HeldNote {
            note,
            release_at: now + event.end_time,
        });
    }
}
