//! Transport state shared between whoever drives playback and the scheduler.
//!
//! The scheduler only ever reads a copy of this; mutation happens through
//! `TransportHandle` (usually from the engine's command queue).

use std::sync::{Arc, RwLock};

use beatline_shared::DEFAULT_BPM;

use crate::config::SchedulerConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransportState {
    pub is_playing: bool,
    pub bpm: f64,
    /// Beat playback (re)starts from
    pub start_beat: f64,
    /// Look-ahead horizon in seconds
    pub max_read_ahead_seconds: f64,
    /// Bumped on every manual restart/loop; a change is a discontinuity
    pub play_count: u64,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            is_playing: false,
            bpm: DEFAULT_BPM,
            start_beat: 0.0,
            max_read_ahead_seconds: 0.1,
            play_count: 0,
        }
    }
}

impl TransportState {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            bpm: config.default_bpm,
            max_read_ahead_seconds: config.look_ahead_seconds,
            ..Self::default()
        }
    }
}

/// Cloneable handle to a shared `TransportState`.
#[derive(Clone, Debug, Default)]
pub struct TransportHandle {
    inner: Arc<RwLock<TransportState>>,
}

impl TransportHandle {
    pub fn new(state: TransportState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Copy of the current state. A poisoned lock still yields the last written value.
    pub fn snapshot(&self) -> TransportState {
        match self.inner.read() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut TransportState)) {
        match self.inner.write() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn play(&self) {
        self.update(|t| t.is_playing = true);
    }

    pub fn stop(&self) {
        self.update(|t| t.is_playing = false);
    }

    /// Jump back to `start_beat` while playing.
    pub fn restart(&self) {
        self.update(|t| t.play_count = t.play_count.wrapping_add(1));
    }

    pub fn set_bpm(&self, bpm: f64) {
        self.update(|t| t.bpm = bpm);
    }
}
