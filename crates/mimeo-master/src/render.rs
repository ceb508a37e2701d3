//! Offline rendering: run a stereo looper over recorded input with a cue script.

use mimeo_engine::{BlockProcessor, Frame, StereoLooper, BLOCK_SIZE};

use crate::action::Cue;
use crate::settings::Settings;

#[derive(Clone, Debug, Default)]
pub struct RenderOptions {
    pub settings: Settings,
    /// Cues in time order.
    pub cues: Vec<Cue>,
    /// Silence appended after the input, in seconds.
    pub tail_seconds: f32,
}

/// Render `input` through a fresh looper. The output has one frame per input
/// frame plus the tail. Cues fire at the first block boundary at or after
/// their time.
pub fn render(input: &[Frame], sample_rate: u32, options: &RenderOptions) -> Vec<Frame> {
    let capacity = options.settings.buffer_samples(sample_rate);
    let mut left = vec![0.0f32; capacity];
    let mut right = vec![0.0f32; capacity];
    let mut looper = StereoLooper::new(&mut left, &mut right, sample_rate as f32);
    options.settings.apply(&mut looper);

    let tail = (options.tail_seconds.max(0.0) * sample_rate as f32) as usize;
    let total = input.len() + tail;
    let mut output = vec![Frame::silence(); total];
    let mut block_in = [Frame::silence(); BLOCK_SIZE];
    let mut cues = options.cues.iter().peekable();

    tracing::info!(
        frames = total,
        sample_rate,
        capacity,
        cues = options.cues.len(),
        "rendering"
    );

    for (block, out) in output.chunks_mut(BLOCK_SIZE).enumerate() {
        let start = block * BLOCK_SIZE;
        let now = start as f32 / sample_rate as f32;
        while let Some(cue) = cues.next_if(|c| c.at_seconds <= now) {
            tracing::debug!(at = cue.at_seconds, action = ?cue.action, "cue");
            cue.action.apply(&mut looper);
        }

        let n = out.len();
        for (i, frame) in block_in[..n].iter_mut().enumerate() {
            *frame = input.get(start + i).copied().unwrap_or_default();
        }
        looper.process_block(&block_in[..n], out);
    }
    output
}
