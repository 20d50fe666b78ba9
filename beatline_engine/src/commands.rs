use beatline_shared::NodeId;

/// Timed instruction for the audio engine, produced by one scheduler tick.
/// Delays are seconds from the moment the tick ran.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteCommand {
    NoteOn {
        instrument: NodeId,
        note: u8,
        delay: f64,
        /// Sequencers that produced this onset (several when duplicates collapsed)
        sources: Vec<NodeId>,
    },
    NoteOff {
        instrument: NodeId,
        note: u8,
        delay: f64,
    },
    /// Drop anything still pending on the instrument and silence it.
    Panic { instrument: NodeId },
}

impl NoteCommand {
    pub fn instrument(&self) -> NodeId {
        match self {
            NoteCommand::NoteOn { instrument, .. }
            | NoteCommand::NoteOff { instrument, .. }
            | NoteCommand::Panic { instrument } => *instrument,
        }
    }
}

/// Transport control queued to the engine and applied at the next tick.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Play,
    Stop,
    /// Jump back to the start beat (bumps the play count)
    Restart,
    SetBpm(f64),
    SetStartBeat(f64),
    SetLookAhead(f64),
}
