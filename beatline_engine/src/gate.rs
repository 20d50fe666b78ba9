use beatline_shared::{MidiGlobalClipEvent, NodeId, precise};

use crate::graph::RoutingGraph;

/// Whether `sequencer` may sound at song position `beat`.
///
/// With no group pattern wired in, the gate is always open. Otherwise at least one
/// connected pattern must be enabled and playing, with an `on` event in the lane it
/// is wired to covering the slot at `beat`.
pub fn is_gate_open(graph: &RoutingGraph, sequencer: NodeId, beat: f64) -> bool {
    let sources = graph.gate_sources(sequencer);
    if sources.is_empty() {
        return true;
    }
    sources
        .iter()
        .any(|(pattern, port)| pattern.is_active() && pattern.lane_open_at(*port, beat))
}

/// Keep only events whose onset (window start + `start_time`) passes the gate.
pub fn filter_events(
    graph: &RoutingGraph,
    sequencer: NodeId,
    window_start: f64,
    events: Vec<MidiGlobalClipEvent>,
) -> Vec<MidiGlobalClipEvent> {
    if graph.gate_sources(sequencer).is_empty() {
        return events;
    }
    events
        .into_iter()
        .filter(|e| is_gate_open(graph, sequencer, precise::add(window_start, e.start_time)))
        .collect()
}
