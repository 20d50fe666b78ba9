use std::collections::HashMap;

use beatline_shared::{GroupPattern, NodeId, RoutingError};
use log::debug;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

use crate::nodes::{Connection, Node};
use crate::sequencer::Sequencer;

/// Point-in-time view of a room's nodes and wiring.
///
/// Edges point downstream: group pattern -> sequencer -> instrument. A stable
/// graph keeps indices valid across removals, and `index` is the single
/// id -> node lookup used by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct RoutingGraph {
    graph: StableDiGraph<Node, Connection>,
    index: HashMap<NodeId, NodeIndex>,
}

impl RoutingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: impl Into<Node>) -> Result<NodeId, RoutingError> {
        let node = node.into();
        let id = node.id();
        if self.index.contains_key(&id) {
            return Err(RoutingError::DuplicateNode(id));
        }
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        Ok(id)
    }

    /// Remove a node and every connection touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, RoutingError> {
        let idx = self.index.remove(&id).ok_or(RoutingError::UnknownNode(id))?;
        self.graph.remove_node(idx).ok_or(RoutingError::UnknownNode(id))
    }

    fn idx(&self, id: NodeId) -> Result<NodeIndex, RoutingError> {
        self.index.get(&id).copied().ok_or(RoutingError::UnknownNode(id))
    }

    /// Wire `from` into `to`. Only sequencer -> instrument and
    /// group pattern -> sequencer (with an existing lane `port`) are valid.
    pub fn connect(&mut self, from: NodeId, to: NodeId, port: usize) -> Result<(), RoutingError> {
        let a = self.idx(from)?;
        let b = self.idx(to)?;
        let invalid = |reason| RoutingError::InvalidConnection { from, to, reason };

        match (&self.graph[a], &self.graph[b]) {
            (Node::Sequencer(_), Node::Instrument(_)) => {
                if port != 0 {
                    return Err(invalid("instrument inputs have a single port"));
                }
            }
            (Node::GroupPattern(pattern), Node::Sequencer(_)) => {
                if port >= pattern.groups.len() {
                    return Err(RoutingError::UnknownPort { pattern: from, port });
                }
            }
            (Node::Instrument(_), _) => return Err(invalid("instruments have no outputs")),
            _ => return Err(invalid("unsupported node pairing")),
        }

        self.graph.update_edge(a, b, Connection { port });
        debug!(
            "wired {} {from} -> {} {to} (port {port})",
            self.graph[a].kind(),
            self.graph[b].kind()
        );
        Ok(())
    }

    pub fn disconnect(&mut self, from: NodeId, to: NodeId) -> Result<bool, RoutingError> {
        let a = self.idx(from)?;
        let b = self.idx(to)?;
        Ok(match self.graph.find_edge(a, b) {
            Some(edge) => self.graph.remove_edge(edge).is_some(),
            None => false,
        })
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).and_then(|&idx| self.graph.node_weight(idx))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let idx = *self.index.get(&id)?;
        self.graph.node_weight_mut(idx)
    }

    pub fn sequencer(&self, id: NodeId) -> Option<&Sequencer> {
        self.node(id).and_then(Node::as_sequencer)
    }

    pub fn sequencer_mut(&mut self, id: NodeId) -> Option<&mut Sequencer> {
        match self.node_mut(id)? {
            Node::Sequencer(s) => Some(s),
            _ => None,
        }
    }

    pub fn group_pattern_mut(&mut self, id: NodeId) -> Option<&mut GroupPattern> {
        match self.node_mut(id)? {
            Node::GroupPattern(g) => Some(g),
            _ => None,
        }
    }

    /// Sequencers in insertion order.
    pub fn sequencers(&self) -> impl Iterator<Item = &Sequencer> + '_ {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx))
            .filter_map(Node::as_sequencer)
    }

    /// Instruments fed by `sequencer`.
    pub fn instruments_for(&self, sequencer: NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.index.get(&sequencer) else {
            return Vec::new();
        };
        let mut targets: Vec<NodeId> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|edge| match &self.graph[edge.target()] {
                Node::Instrument(i) => Some(i.id),
                _ => None,
            })
            .collect();
        targets.sort();
        targets
    }

    /// Group patterns gating `sequencer`, each with the lane it is wired to.
    pub fn gate_sources(&self, sequencer: NodeId) -> Vec<(&GroupPattern, usize)> {
        let Some(&idx) = self.index.get(&sequencer) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Incoming)
            .filter_map(|edge| {
                self.graph[edge.source()]
                    .as_group_pattern()
                    .map(|pattern| (pattern, edge.weight().port))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
