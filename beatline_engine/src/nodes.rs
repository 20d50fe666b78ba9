use beatline_shared::{GroupPattern, NodeId};

use crate::sequencer::Sequencer;

/// Target of sequencer output. Sound generation lives behind the `NoteSink`.
#[derive(Debug, Clone)]
pub struct Instrument {
    pub id: NodeId,
    pub name: String,
}

impl Instrument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new_v4(),
            name: name.into(),
        }
    }
}

/// Every connectable thing in a room, keyed by one id space.
#[derive(Debug, Clone)]
pub enum Node {
    Sequencer(Sequencer),
    GroupPattern(GroupPattern),
    Instrument(Instrument),
}

impl Node {
    pub fn id(&self) -> NodeId {
        match self {
            Node::Sequencer(s) => s.id,
            Node::GroupPattern(g) => g.id,
            Node::Instrument(i) => i.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::Sequencer(_) => "sequencer",
            Node::GroupPattern(_) => "group pattern",
            Node::Instrument(_) => "instrument",
        }
    }

    pub fn as_sequencer(&self) -> Option<&Sequencer> {
        match self {
            Node::Sequencer(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_group_pattern(&self) -> Option<&GroupPattern> {
        match self {
            Node::GroupPattern(g) => Some(g),
            _ => None,
        }
    }
}

impl From<Sequencer> for Node {
    fn from(value: Sequencer) -> Self {
        Node::Sequencer(value)
    }
}

impl From<GroupPattern> for Node {
    fn from(value: GroupPattern) -> Self {
        Node::GroupPattern(value)
    }
}

impl From<Instrument> for Node {
    fn from(value: Instrument) -> Self {
        Node::Instrument(value)
    }
}

/// Edge weight. `port` selects the gate lane for group pattern -> sequencer edges
/// and is 0 for everything else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Connection {
    pub port: usize,
}
