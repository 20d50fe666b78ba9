pub mod commands;
pub mod config;
pub mod engine;
pub mod extract;
pub mod gate;
pub mod graph;
pub mod nodes;
pub mod scheduler;
pub mod sequencer;
pub mod tempo;
pub mod transport;

// Re-exports
pub use commands::{EngineCommand, NoteCommand};
pub use config::SchedulerConfig;
pub use engine::{
    ChannelSink, Clock, Engine, ManualClock, NoteSink, SharedGraph, SystemClock, edit_graph,
    shared_graph,
};
pub use extract::{Extractor, get_events, get_events_playing_at_time};
pub use graph::RoutingGraph;
pub use nodes::{Instrument, Node};
pub use scheduler::{Scheduler, SchedulerState};
pub use sequencer::Sequencer;
pub use transport::{TransportHandle, TransportState};

#[cfg(test)]
mod tests_playback;
