//! Device traits, error type and interleaving helpers.

use mimeo_dsp::Frame;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("device init error: {0}")]
    DeviceInit(String),
    #[error("stream create error: {0}")]
    StreamCreate(String),
    #[error("playback error: {0}")]
    Playback(String),
    #[error("no {0} device available")]
    NoDevice(&'static str),
}

/// Sink for processed frames.
pub trait AudioOutput {
    fn sample_rate(&self) -> u32;

    /// Queue frames without blocking; frames that do not fit are dropped.
    /// Returns how many were queued.
    fn write(&mut self, frames: &[Frame]) -> usize;

    fn start(&mut self) -> Result<(), AudioError>;

    fn stop(&mut self) -> Result<(), AudioError>;
}

/// Source of captured frames.
pub trait AudioInput {
    fn sample_rate(&self) -> u32;

    /// Fill `frames` from what has been captured so far. Returns how many were filled.
    fn read(&mut self, frames: &mut [Frame]) -> usize;

    fn start(&mut self) -> Result<(), AudioError>;

    fn stop(&mut self) -> Result<(), AudioError>;
}

/// Write `frame` into one interleaved device frame; extra channels get silence,
/// a mono device gets the average.
pub(crate) fn interleave(frame: Frame, chunk: &mut [f32]) {
    match chunk.len() {
        0 => {}
        1 => chunk[0] = (frame.left + frame.right) * 0.5,
        _ => {
            chunk[0] = frame.left;
            chunk[1] = frame.right;
            chunk[2..].fill(0.0);
        }
    }
}

/// Read one interleaved device frame; a mono device feeds both sides.
pub(crate) fn deinterleave(chunk: &[f32]) -> Frame {
    match chunk {
        [] => Frame::silence(),
        [mono] => Frame::mono(*mono),
        [left, right, ..] => Frame::new(*left, *right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleave_pads_extra_channels() {
        let mut chunk = [9.0f32; 4];
        interleave(Frame::new(0.1, 0.2), &mut chunk);
        assert_eq!(chunk, [0.1, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn interleave_mono_device_averages() {
        let mut chunk = [0.0f32; 1];
        interleave(Frame::new(0.5, -0.25), &mut chunk);
        assert_eq!(chunk, [0.125]);
    }

    #[test]
    fn deinterleave_layouts() {
        assert_eq!(deinterleave(&[0.3]), Frame::mono(0.3));
        assert_eq!(deinterleave(&[0.1, 0.2, 0.9]), Frame::new(0.1, 0.2));
        assert_eq!(deinterleave(&[]), Frame::silence());
    }
}
