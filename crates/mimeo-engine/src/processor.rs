//! Block processing seam shared by the live audio thread and offline rendering.

use mimeo_dsp::Frame;

/// Something that turns a block of input frames into a block of output frames.
pub trait BlockProcessor {
    fn sample_rate(&self) -> f32;

    /// Process `input` into `output`. Both slices have the same length.
    fn process_block(&mut self, input: &[Frame], output: &mut [Frame]);
}
