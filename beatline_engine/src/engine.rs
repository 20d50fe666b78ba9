use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use arc_swap::ArcSwap;
use beatline_shared::NodeId;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};

use crate::commands::{EngineCommand, NoteCommand};
use crate::config::SchedulerConfig;
use crate::graph::RoutingGraph;
use crate::scheduler::{Scheduler, SchedulerState};
use crate::transport::{TransportHandle, TransportState};

/// Routing graph shared between the editor and the engine. The engine loads a
/// snapshot per tick; edits publish a whole new graph.
pub type SharedGraph = Arc<ArcSwap<RoutingGraph>>;

pub fn shared_graph(graph: RoutingGraph) -> SharedGraph {
    Arc::new(ArcSwap::from_pointee(graph))
}

/// Clone the current graph, edit the copy and publish it. Assumes a single writer.
pub fn edit_graph<R>(shared: &SharedGraph, edit: impl FnOnce(&mut RoutingGraph) -> R) -> R {
    let mut next = RoutingGraph::clone(&shared.load());
    let result = edit(&mut next);
    shared.store(Arc::new(next));
    result
}

/// Monotonic time source in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock moved by hand (offline rendering, tests). Clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock {
    seconds: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn set(&self, seconds: f64) {
        self.seconds.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds.load(Ordering::Relaxed))
    }
}

/// Receiver of scheduled notes (a synth, a MIDI port, a recorder).
pub trait NoteSink {
    fn note_on(&mut self, instrument: NodeId, note: u8, delay: f64, sources: &[NodeId]);
    fn note_off(&mut self, instrument: NodeId, note: u8, delay: f64);
    fn panic(&mut self, instrument: NodeId);

    fn dispatch(&mut self, command: NoteCommand) {
        match command {
            NoteCommand::NoteOn { instrument, note, delay, sources } => {
                self.note_on(instrument, note, delay, &sources)
            }
            NoteCommand::NoteOff { instrument, note, delay } => {
                self.note_off(instrument, note, delay)
            }
            NoteCommand::Panic { instrument } => self.panic(instrument),
        }
    }
}

/// Forwards every command over a channel, e.g. to an audio thread.
pub struct ChannelSink {
    tx: Sender<NoteCommand>,
}

impl ChannelSink {
    pub fn new(tx: Sender<NoteCommand>) -> Self {
        Self { tx }
    }

    fn send(&self, command: NoteCommand) {
        if self.tx.send(command).is_err() {
            warn!("note receiver disconnected; dropping command");
        }
    }
}

impl NoteSink for ChannelSink {
    fn note_on(&mut self, instrument: NodeId, note: u8, delay: f64, sources: &[NodeId]) {
        self.send(NoteCommand::NoteOn { instrument, note, delay, sources: sources.to_vec() });
    }

    fn note_off(&mut self, instrument: NodeId, note: u8, delay: f64) {
        self.send(NoteCommand::NoteOff { instrument, note, delay });
    }

    fn panic(&mut self, instrument: NodeId) {
        self.send(NoteCommand::Panic { instrument });
    }

    fn dispatch(&mut self, command: NoteCommand) {
        self.send(command);
    }
}

/// Drives the scheduler: drains queued transport commands, then runs one tick
/// against the latest graph snapshot and hands the result to the sink.
pub struct Engine<S: NoteSink, C: Clock> {
    scheduler: Scheduler,
    state: SchedulerState,
    transport: TransportHandle,
    graph: SharedGraph,
    command_rx: Receiver<EngineCommand>,
    sink: S,
    clock: C,
}

impl<S: NoteSink, C: Clock> Engine<S, C> {
    pub fn new(
        config: SchedulerConfig,
        command_rx: Receiver<EngineCommand>,
        graph: SharedGraph,
        sink: S,
        clock: C,
    ) -> Self {
        let transport = TransportHandle::new(TransportState::from_config(&config));
        info!(
            "engine ready: {} BPM, {:.3}s look-ahead, {} node(s)",
            config.default_bpm,
            config.look_ahead_seconds,
            graph.load().len()
        );
        Self {
            scheduler: Scheduler::new(config),
            state: SchedulerState::new(),
            transport,
            graph,
            command_rx,
            sink,
            clock,
        }
    }

    pub fn transport(&self) -> TransportHandle {
        self.transport.clone()
    }

    pub fn graph(&self) -> SharedGraph {
        self.graph.clone()
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// Apply one transport command. `Stop` releases held notes at once, so a
    /// `Stop` + `Play` queued between two ticks still restarts from the start beat.
    pub fn apply_command(&mut self, command: EngineCommand) {
        debug!("engine command: {command:?}");
        match command {
            EngineCommand::Play => self.transport.play(),
            EngineCommand::Stop => {
                self.transport.stop();
                self.release_all();
            }
            EngineCommand::Restart => self.transport.restart(),
            EngineCommand::SetBpm(bpm) => {
                if bpm.is_finite() && bpm > 0.0 {
                    self.transport.set_bpm(bpm);
                } else {
                    warn!("ignoring invalid tempo {bpm}");
                }
            }
            EngineCommand::SetStartBeat(beat) => {
                if beat.is_finite() && beat >= 0.0 {
                    self.transport.update(|t| t.start_beat = beat);
                } else {
                    warn!("ignoring invalid start beat {beat}");
                }
            }
            EngineCommand::SetLookAhead(seconds) => {
                if seconds.is_finite() && seconds > 0.0 {
                    self.transport.update(|t| t.max_read_ahead_seconds = seconds);
                } else {
                    warn!("ignoring invalid look-ahead {seconds}");
                }
            }
        }
    }

    /// One scheduling pass. Returns the number of commands handed to the sink.
    pub fn tick(&mut self) -> usize {
        while let Ok(command) = self.command_rx.try_recv() {
            self.apply_command(command);
        }

        let transport = self.transport.snapshot();
        let graph = self.graph.load();
        let now = self.clock.now();
        let commands = self.scheduler.tick(&mut self.state, &transport, &graph, now);

        let count = commands.len();
        for command in commands {
            self.sink.dispatch(command);
        }
        count
    }

    /// Stop the transport and release everything at once, without waiting for a tick.
    pub fn shutdown(&mut self) {
        self.transport.stop();
        self.release_all();
        info!("engine stopped");
    }

    fn release_all(&mut self) {
        let now = self.clock.now();
        for command in self.scheduler.stop(&mut self.state, now) {
            self.sink.dispatch(command);
        }
    }
}
