use beatline_shared::precise::{self, MAX_BEAT_VALUE};
use beatline_shared::{MidiClip, MidiGlobalClipEvent, MidiRange, NodeId, RangeError};

use crate::extract::Extractor;

/// A clip player node. The scheduler reads it; edits replace the clip wholesale.
#[derive(Debug, Clone)]
pub struct Sequencer {
    pub id: NodeId,
    pub name: String,
    pub clip: MidiClip,
    /// Playback rate applied to clip positions (2.0 = half speed, 0.5 = double time)
    pub rate: f64,
    pub enabled: bool,
    pub playing: bool,
}

impl Sequencer {
    pub fn new(name: impl Into<String>, clip: MidiClip) -> Self {
        Self {
            id: NodeId::new_v4(),
            name: name.into(),
            clip,
            rate: 1.0,
            enabled: true,
            playing: true,
        }
    }

    /// Rejects rates that are not finite or that stretch the clip past `MAX_BEAT_VALUE`.
    pub fn with_rate(mut self, rate: f64) -> Result<Self, RangeError> {
        if !rate.is_finite() {
            return Err(RangeError::NotFinite);
        }
        let scaled = self.clip.length * rate;
        if scaled.abs() > MAX_BEAT_VALUE {
            return Err(RangeError::OutOfRange(scaled));
        }
        self.rate = rate;
        Ok(self)
    }

    /// Whether the scheduler should read this sequencer at all.
    pub fn is_active(&self) -> bool {
        let scaled = self.clip.length * self.rate;
        self.enabled
            && self.playing
            && self.clip.is_playable()
            && scaled > 0.0
            && scaled <= MAX_BEAT_VALUE
    }

    /// Effective loop length in beats after applying the rate.
    pub fn loop_length(&self) -> f64 {
        precise::round(self.clip.length * self.rate)
    }

    /// Read a window of events, optionally recovering notes held at `restart_beat`.
    pub fn read(
        &self,
        extractor: &Extractor,
        window: &MidiRange,
        restart_beat: Option<f64>,
    ) -> Vec<MidiGlobalClipEvent> {
        extractor.get_events(&self.clip, window, self.rate, restart_beat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatline_shared::MidiClipEvent;

    #[test]
    fn test_loop_length_follows_rate() {
        let seq = Sequencer::new("bass", MidiClip::new(3.0, true)).with_rate(0.5).unwrap();
        assert_eq!(seq.loop_length(), 1.5);
    }

    #[test]
    fn test_inactive_states() {
        let mut seq = Sequencer::new("lead", MidiClip::new(4.0, true));
        assert!(seq.is_active());
        seq.playing = false;
        assert!(!seq.is_active());
        seq.playing = true;
        seq.enabled = false;
        assert!(!seq.is_active());

        let empty = Sequencer::new("empty", MidiClip::new(0.0, true));
        assert!(!empty.is_active());
    }

    #[test]
    fn test_read_uses_rate() {
        let clip = MidiClip::with_events(1.0, true, [MidiClipEvent::new(0.5, 0.25, 48)]).unwrap();
        let seq = Sequencer::new("hat", clip).with_rate(2.0).unwrap();
        let window = MidiRange::new(0.0, 2.0).unwrap();
        let events = seq.read(&Extractor::default(), &window, None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_time, 1.0);
        assert_eq!(events[0].end_time, 1.5);
    }

    #[test]
    fn test_rate_beyond_ceiling_rejected() {
        let clip = MidiClip::new(4.0, true);
        assert_eq!(
            Sequencer::new("a", clip.clone()).with_rate(f64::NAN).err(),
            Some(RangeError::NotFinite)
        );
        assert_eq!(
            Sequencer::new("b", clip.clone()).with_rate(1e10).err(),
            Some(RangeError::OutOfRange(4e10))
        );

        // Set directly, an out-of-range rate keeps the sequencer silent
        let mut seq = Sequencer::new("c", clip);
        seq.rate = 1e10;
        assert!(!seq.is_active());
        seq.rate = -1.0;
        assert!(!seq.is_active());
    }
}
