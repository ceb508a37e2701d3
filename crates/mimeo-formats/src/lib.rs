//! WAV reading and writing for the mimeo looper.
//!
//! Decodes 8/16-bit PCM and 32-bit float WAV (mono or stereo) into stereo
//! [`Frame`]s and encodes frames as 16-bit stereo PCM.

mod wav;

pub use mimeo_dsp::Frame;
pub use wav::{decode_wav, frames_to_wav, load_wav, save_wav, write_wav, WavAudio};

use thiserror::Error;

/// Error type for WAV parsing and file I/O.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("not a RIFF/WAVE file")]
    InvalidHeader,
    #[error("missing {0} chunk")]
    MissingChunk(&'static str),
    #[error("unexpected end of file")]
    UnexpectedEof,
    #[error("unsupported WAV encoding: format {format}, {bits} bits, {channels} channels")]
    Unsupported { format: u16, bits: u16, channels: u16 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
