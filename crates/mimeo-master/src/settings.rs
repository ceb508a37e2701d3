//! Persisted configuration and its fixed storage slots.
//!
//! A slot is a JSON file `<dir>/slot-<n>.json`, `n` in `0..SLOT_COUNT`.

use std::fs;
use std::path::{Path, PathBuf};

use mimeo_engine::{
    BlockProcessor, Channel, Direction, LinkMode, Movement, StereoLooper, WriteMode, DEFAULT_GAIN,
    DEFAULT_MIX, FILTER_MAX_HZ,
};
use serde::{Deserialize, Serialize};

use crate::error::MasterError;

pub const SLOT_COUNT: usize = 8;

/// Per-channel buffer length limits, in seconds.
pub const MIN_BUFFER_SECONDS: f32 = 1.0;
pub const MAX_BUFFER_SECONDS: f32 = 600.0;

/// The scalar configuration surface saved between runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Per-channel buffer capacity.
    pub buffer_seconds: f32,
    pub speed: f32,
    pub movement: Movement,
    pub direction: Direction,
    pub link: LinkMode,
    pub write_mode: WriteMode,
    pub gain: f32,
    pub mix: f32,
    pub feedback: f32,
    pub filter_hz: f32,
    /// `None` loops the whole recording.
    pub loop_length_seconds: Option<f32>,
    pub looping: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            buffer_seconds: 30.0,
            speed: 1.0,
            movement: Movement::Normal,
            direction: Direction::Forward,
            link: LinkMode::Mono,
            write_mode: WriteMode::Fixed,
            gain: DEFAULT_GAIN,
            mix: DEFAULT_MIX,
            feedback: 0.5,
            filter_hz: FILTER_MAX_HZ,
            loop_length_seconds: None,
            looping: true,
        }
    }
}

impl Settings {
    /// Buffer capacity in samples at `sample_rate`, with the length clamped
    /// to `[MIN_BUFFER_SECONDS, MAX_BUFFER_SECONDS]`.
    pub fn buffer_samples(&self, sample_rate: u32) -> usize {
        let seconds = if self.buffer_seconds.is_finite() {
            self.buffer_seconds.clamp(MIN_BUFFER_SECONDS, MAX_BUFFER_SECONDS)
        } else {
            MIN_BUFFER_SECONDS
        };
        if seconds != self.buffer_seconds {
            tracing::warn!(
                requested = self.buffer_seconds,
                used = seconds,
                "buffer length out of range"
            );
        }
        (seconds as f64 * sample_rate as f64) as usize
    }

    /// Push every field into `looper`. The looper clamps what it receives.
    pub fn apply(&self, looper: &mut StereoLooper<'_>) {
        looper.set_link_mode(self.link);
        looper.set_write_mode(Channel::Both, self.write_mode);
        looper.set_speed(Channel::Both, self.speed);
        looper.set_movement(Channel::Both, self.movement);
        looper.set_direction(Channel::Both, self.direction);
        looper.set_looping(Channel::Both, self.looping);
        looper.set_gain(self.gain);
        looper.set_mix(self.mix);
        looper.set_feedback(self.feedback);
        looper.set_filter(self.filter_hz);
        if let Some(seconds) = self.loop_length_seconds {
            looper.set_loop_length_seconds(Channel::Both, seconds);
        }
        tracing::debug!(sample_rate = looper.sample_rate(), "applied settings");
    }
}

/// Directory of settings slots.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    dir: PathBuf,
}

impl SettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn slot_path(&self, slot: usize) -> Result<PathBuf, MasterError> {
        if slot >= SLOT_COUNT {
            return Err(MasterError::InvalidSlot(slot));
        }
        Ok(self.dir.join(format!("slot-{slot}.json")))
    }

    /// Settings stored in `slot`, or `None` if the slot was never written.
    pub fn load(&self, slot: usize) -> Result<Option<Settings>, MasterError> {
        let path = self.slot_path(slot)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        let settings = serde_json::from_str(&data)?;
        tracing::info!(slot, path = %path.display(), "loaded settings");
        Ok(Some(settings))
    }

    pub fn load_or_default(&self, slot: usize) -> Result<Settings, MasterError> {
        Ok(self.load(slot)?.unwrap_or_default())
    }

    /// Write `settings` into `slot`, creating the directory if needed.
    pub fn save(&self, slot: usize, settings: &Settings) -> Result<(), MasterError> {
        let path = self.slot_path(slot)?;
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&path, json)?;
        tracing::info!(slot, path = %path.display(), "saved settings");
        Ok(())
    }

    /// Slots that currently hold settings.
    pub fn occupied(&self) -> Vec<usize> {
        (0..SLOT_COUNT)
            .filter(|&slot| self.slot_path(slot).is_ok_and(|p| p.exists()))
            .collect()
    }
}
