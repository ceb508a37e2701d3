use mimeo_audio::AudioError;
use mimeo_formats::FormatError;
use thiserror::Error;

use crate::settings::SLOT_COUNT;

#[derive(Error, Debug)]
pub enum MasterError {
    #[error("settings slot {0} out of range (0..{SLOT_COUNT})")]
    InvalidSlot(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("session already running")]
    AlreadyRunning,
    #[error("audio thread panicked")]
    SessionPanicked,
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Format(#[from] FormatError),
}
