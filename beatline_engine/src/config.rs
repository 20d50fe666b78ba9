use std::path::Path;

use beatline_shared::DEFAULT_BPM;
use serde::{Deserialize, Serialize};

use crate::extract::DEFAULT_MAX_LAPS;

/// Scheduler tuning. Every field falls back to its default when missing from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds of audio scheduled ahead of the play position. Too small and notes
    /// land late; too large and mutes/tempo changes lag.
    pub look_ahead_seconds: f64,
    /// Extra read window on the first tick after a start or restart
    pub jump_start_seconds: f64,
    /// Lap cap for a single clip read
    pub max_laps: usize,
    pub default_bpm: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            look_ahead_seconds: 0.1,
            jump_start_seconds: 0.05,
            max_laps: DEFAULT_MAX_LAPS,
            default_bpm: DEFAULT_BPM,
        }
    }
}

impl SchedulerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, anyhow::Error> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.look_ahead_seconds > 0.0) {
            anyhow::bail!("look_ahead_seconds must be > 0 (got {})", self.look_ahead_seconds);
        }
        if !(self.jump_start_seconds >= 0.0) {
            anyhow::bail!("jump_start_seconds must be >= 0 (got {})", self.jump_start_seconds);
        }
        if self.max_laps == 0 {
            anyhow::bail!("max_laps must be at least 1");
        }
        if !(self.default_bpm > 0.0) {
            anyhow::bail!("default_bpm must be > 0 (got {})", self.default_bpm);
        }
        Ok(())
    }
}
