//! End-to-end playback through `Engine` with a hand-driven clock.

use std::collections::HashMap;

use beatline_shared::{GroupEvent, GroupPattern, MidiClip, MidiClipEvent, NodeId, REST_NOTE};
use crossbeam_channel::{Sender, unbounded};

use crate::commands::{EngineCommand, NoteCommand};
use crate::config::SchedulerConfig;
use crate::engine::{Clock, Engine, ManualClock, NoteSink, edit_graph, shared_graph};
use crate::graph::RoutingGraph;
use crate::nodes::Instrument;
use crate::sequencer::Sequencer;

/// Keeps every command with the clock time it arrived at.
struct RecordingSink {
    clock: ManualClock,
    log: Vec<(f64, NoteCommand)>,
}

impl NoteSink for RecordingSink {
    fn note_on(&mut self, instrument: NodeId, note: u8, delay: f64, sources: &[NodeId]) {
        let sources = sources.to_vec();
        self.log.push((self.clock.now(), NoteCommand::NoteOn { instrument, note, delay, sources }));
    }

    fn note_off(&mut self, instrument: NodeId, note: u8, delay: f64) {
        self.log.push((self.clock.now(), NoteCommand::NoteOff { instrument, note, delay }));
    }

    fn panic(&mut self, instrument: NodeId) {
        self.log.push((self.clock.now(), NoteCommand::Panic { instrument }));
    }
}

impl RecordingSink {
    /// (absolute onset time, note) for every NoteOn.
    fn onsets(&self) -> Vec<(f64, u8)> {
        self.log
            .iter()
            .filter_map(|(at, c)| match c {
                NoteCommand::NoteOn { note, delay, .. } => Some((at + delay, *note)),
                _ => None,
            })
            .collect()
    }
}

struct Rig {
    engine: Engine<RecordingSink, ManualClock>,
    clock: ManualClock,
    commands: Sender<EngineCommand>,
}

impl Rig {
    fn new(graph: RoutingGraph, bpm: f64, look_ahead_seconds: f64) -> Self {
        let config = SchedulerConfig {
            look_ahead_seconds,
            jump_start_seconds: 0.0,
            default_bpm: bpm,
            ..SchedulerConfig::default()
        };
        let (tx, rx) = unbounded();
        let clock = ManualClock::default();
        let sink = RecordingSink { clock: clock.clone(), log: Vec::new() };
        let engine = Engine::new(config, rx, shared_graph(graph), sink, clock.clone());
        Self { engine, clock, commands: tx }
    }

    fn send(&self, command: EngineCommand) {
        self.commands.send(command).unwrap();
    }

    fn tick_at(&mut self, seconds: f64) -> usize {
        self.clock.set(seconds);
        self.engine.tick()
    }

    fn sink(&self) -> &RecordingSink {
        self.engine.sink()
    }
}

fn clip(events: &[(f64, f64, i8)]) -> MidiClip {
    let events = events.iter().map(|&(s, d, n)| MidiClipEvent::new(s, d, n));
    MidiClip::with_events(4.0, true, events).unwrap()
}

fn room(clip: MidiClip) -> (RoutingGraph, NodeId, NodeId) {
    let mut graph = RoutingGraph::new();
    let seq = graph.add_node(Sequencer::new("seq", clip)).unwrap();
    let inst = graph.add_node(Instrument::new("synth")).unwrap();
    graph.connect(seq, inst, 0).unwrap();
    (graph, seq, inst)
}

#[test]
fn test_two_ticks_schedule_each_onset_once() {
    let (graph, ..) = room(clip(&[
        (0.0, 0.1, 60),
        (0.25, 0.1, 61),
        (0.5, 0.1, 62),
        (0.625, 0.1, 63),
        (0.75, 0.1, 64),
    ]));
    let mut rig = Rig::new(graph, 60.0, 0.5);
    rig.send(EngineCommand::Play);

    rig.tick_at(0.0);
    rig.tick_at(0.25);

    // Windows [0, 0.5) and [0.5, 0.75): 0.75 belongs to the next read
    let onsets = rig.sink().onsets();
    let expected = [(0.0, 60), (0.25, 61), (0.5, 62), (0.625, 63)];
    assert_eq!(onsets.len(), expected.len());
    for ((at, note), (want_at, want_note)) in onsets.iter().zip(expected) {
        assert_eq!(*note, want_note);
        assert!((at - want_at).abs() < 1e-9, "note {note} at {at}, expected {want_at}");
    }
}

#[test]
fn test_jittery_ticks_never_duplicate_or_drop() {
    let pattern = [
        (0.0, 0.5, 36),
        (0.5, 0.25, 42),
        (1.0, 0.5, 38),
        (1.75, 0.25, 42),
        (2.5, 0.5, 36),
        (3.0, 1.0, 38),
    ];
    let (graph, ..) = room(clip(&pattern));
    let mut rig = Rig::new(graph, 60.0, 0.2);
    rig.send(EngineCommand::Play);

    let mut rng = fastrand::Rng::with_seed(7);
    let mut millis = 0u32;
    rig.tick_at(0.0);
    while millis < 12_000 {
        millis += rng.u32(20..=200);
        rig.tick_at(f64::from(millis) / 1000.0);
    }

    let horizon = rig.engine.state().cursor_beats;
    let mut expected = Vec::new();
    for lap in 0..4 {
        for &(start, _, note) in &pattern {
            let beat = f64::from(lap) * 4.0 + start;
            if beat < horizon {
                expected.push((beat, note as u8));
            }
        }
    }

    // At 60 BPM a beat is a second
    let onsets = rig.sink().onsets();
    assert_eq!(onsets.len(), expected.len());
    for (beat, note) in expected {
        let hits = onsets.iter().filter(|(at, n)| *n == note && (at - beat).abs() < 1e-6).count();
        assert_eq!(hits, 1, "note {note} at beat {beat} scheduled {hits} times");
    }
}

#[test]
fn test_stop_releases_every_sounding_note() {
    let mut graph = RoutingGraph::new();
    let bass = graph.add_node(Instrument::new("bass")).unwrap();
    let pad = graph.add_node(Instrument::new("pad")).unwrap();
    let low = graph.add_node(Sequencer::new("low", clip(&[(0.0, 4.0, 36)]))).unwrap();
    let chord_clip = clip(&[(0.0, 2.0, 60), (0.0, 2.0, 64)]);
    let chords = graph.add_node(Sequencer::new("chords", chord_clip)).unwrap();
    graph.connect(low, bass, 0).unwrap();
    graph.connect(chords, pad, 0).unwrap();

    let mut rig = Rig::new(graph, 120.0, 0.1);
    rig.send(EngineCommand::Play);
    rig.tick_at(0.0);
    rig.tick_at(0.05);
    assert_eq!(rig.engine.state().held_count(), 3);

    rig.send(EngineCommand::Stop);
    rig.tick_at(0.1);
    assert!(!rig.engine.is_playing());

    let releases: Vec<_> = rig
        .sink()
        .log
        .iter()
        .filter(|(at, _)| *at == 0.1)
        .map(|(_, c)| c.clone())
        .collect();
    let mut off_count: HashMap<NodeId, usize> = HashMap::new();
    for command in &releases {
        if let NoteCommand::NoteOff { instrument, delay, .. } = command {
            assert_eq!(*delay, 0.0);
            *off_count.entry(*instrument).or_default() += 1;
        }
    }
    assert_eq!(off_count.get(&bass), Some(&1));
    assert_eq!(off_count.get(&pad), Some(&2));
    assert!(releases.contains(&NoteCommand::Panic { instrument: bass }));
    assert!(releases.contains(&NoteCommand::Panic { instrument: pad }));

    // Stopping again is a no-op
    assert_eq!(rig.tick_at(0.2), 0);
}

#[test]
fn test_stop_then_play_between_ticks_releases_and_rewinds() {
    let (graph, _, inst) = room(clip(&[(0.0, 3.0, 60)]));
    let mut rig = Rig::new(graph, 60.0, 0.25);
    rig.send(EngineCommand::Play);
    rig.tick_at(0.0);
    rig.tick_at(1.0);
    assert_eq!(rig.engine.state().held_count(), 1);

    let before = rig.sink().log.len();
    rig.send(EngineCommand::Stop);
    rig.send(EngineCommand::Play);
    rig.tick_at(1.05);

    let after: Vec<_> = rig.sink().log[before..].iter().map(|(_, c)| c.clone()).collect();
    assert_eq!(after[0], NoteCommand::NoteOff { instrument: inst, note: 60, delay: 0.0 });
    assert_eq!(after[1], NoteCommand::Panic { instrument: inst });
    // Playback starts over from beat 0 and hits the note's onset again
    assert!(matches!(&after[2], NoteCommand::NoteOn { note: 60, delay, .. } if *delay == 0.0));
    assert_eq!(rig.engine.state().current_song_time_beats, 0.0);
    assert_eq!(rig.engine.state().song_start_time, 1.05);
    assert_eq!(rig.engine.state().held_count(), 1);
}

#[test]
fn test_tempo_change_applies_to_later_notes() {
    let (graph, ..) = room(clip(&[(1.5, 0.5, 60)]));
    let mut rig = Rig::new(graph, 60.0, 0.5);
    rig.send(EngineCommand::Play);
    rig.tick_at(0.0);

    rig.send(EngineCommand::SetBpm(120.0));
    rig.tick_at(0.25);
    assert!(rig.sink().onsets().is_empty());

    // Beat 0.6 now; the note is 0.9 beats ahead at 120 BPM
    rig.tick_at(0.3);
    let onsets = rig.sink().onsets();
    assert_eq!(onsets.len(), 1);
    assert!((onsets[0].0 - 0.75).abs() < 1e-9);
}

#[test]
fn test_restart_jumps_and_recovers_sustain() {
    let (graph, _, inst) = room(clip(&[(0.0, 3.0, 48), (2.0, 0.5, 55)]));
    let mut rig = Rig::new(graph, 60.0, 0.25);
    rig.send(EngineCommand::SetStartBeat(1.0));
    rig.send(EngineCommand::Play);
    rig.tick_at(0.0);

    // Started inside the long note: it is recovered immediately with 2 beats left
    let log = &rig.sink().log;
    assert_eq!(log.len(), 2);
    assert!(matches!(&log[0].1, NoteCommand::NoteOn { note: 48, delay, .. } if *delay == 0.0));
    assert_eq!(log[1].1, NoteCommand::NoteOff { instrument: inst, note: 48, delay: 2.0 });

    rig.tick_at(1.0);
    let before = rig.sink().log.len();
    rig.send(EngineCommand::Restart);
    rig.tick_at(1.5);

    let after = &rig.sink().log[before..];
    assert_eq!(after[0].1, NoteCommand::NoteOff { instrument: inst, note: 48, delay: 0.0 });
    assert_eq!(after[1].1, NoteCommand::Panic { instrument: inst });
    assert!(after.iter().any(
        |(_, c)| matches!(c, NoteCommand::NoteOn { note: 48, delay, .. } if *delay == 0.0)
    ));
    assert_eq!(rig.engine.state().current_song_time_beats, 1.0);
}

#[test]
fn test_gated_doubles_collapse_and_rests_stay_silent() {
    let mut graph = RoutingGraph::new();
    let drums = graph.add_node(Instrument::new("drums")).unwrap();
    let steps = [(0.0, 0.25, 36), (1.0, 0.25, REST_NOTE), (2.0, 0.25, 36), (3.0, 0.25, 38)];
    let main = graph.add_node(Sequencer::new("main", clip(&steps))).unwrap();
    let double = graph.add_node(Sequencer::new("double", clip(&steps))).unwrap();
    graph.connect(main, drums, 0).unwrap();
    graph.connect(double, drums, 0).unwrap();

    // The double only plays in the first half of the bar
    let mut pattern = GroupPattern::new("half", 4.0, 1.0, 1);
    pattern.groups[0].events = vec![GroupEvent { start_beat: 0.0, length: 2.0, on: true }];
    let gate = graph.add_node(pattern).unwrap();
    graph.connect(gate, double, 0).unwrap();

    let mut rig = Rig::new(graph, 60.0, 4.0);
    rig.send(EngineCommand::Play);
    rig.tick_at(0.0);

    let ons: Vec<_> = rig
        .sink()
        .log
        .iter()
        .filter_map(|(_, c)| match c {
            NoteCommand::NoteOn { note, delay, sources, .. } => {
                Some((*note, *delay, sources.len()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(ons, vec![(36, 0.0, 2), (36, 2.0, 1), (38, 3.0, 1)]);
}

#[test]
fn test_live_graph_edit_takes_effect_next_tick() {
    let (graph, seq, _) = room(clip(&[(0.0, 0.25, 60), (0.5, 0.25, 62), (1.0, 0.25, 64)]));
    let mut rig = Rig::new(graph, 60.0, 0.25);
    rig.send(EngineCommand::Play);
    rig.tick_at(0.0);
    assert_eq!(rig.sink().onsets().len(), 1);

    edit_graph(&rig.engine.graph(), |g| {
        if let Some(s) = g.sequencer_mut(seq) {
            s.playing = false;
        }
    });
    rig.tick_at(0.5);
    rig.tick_at(1.0);
    assert_eq!(rig.sink().onsets().len(), 1);
}
