//! Loop engine for the mimeo looper.
//!
//! Cursors ([`Head`]) move over an injected sample buffer; a [`Looper`] owns
//! one channel's buffer, its write and read cursors and the
//! buffering → recording ⇄ frozen state machine; [`StereoLooper`] drives two
//! of them with input shaping, channel linking, a feedback tone filter and
//! the final dry/wet blend.
//!
//! Nothing in this crate allocates or blocks on the per-sample path.
//! Designed to be `no_std` compatible.

#![cfg_attr(not(feature = "std"), no_std)]

mod head;
mod looper;
mod movement;
mod processor;
mod stereo;
pub mod timing;

pub use head::{read_linear, Head};
pub use looper::{Looper, LooperState, WriteMode};
pub use movement::{Boundary, Direction, Movement, Topology};
pub use processor::BlockProcessor;
pub use stereo::{Channel, LinkMode, Requests, StereoLooper};

pub use mimeo_dsp::Frame;

/// Shortest loop any setter can produce, in samples (1 ms at 48 kHz).
pub const MIN_LOOP_LENGTH_SAMPLES: usize = 48;

/// Frames per block on the live audio path.
pub const BLOCK_SIZE: usize = 64;

pub const MIN_SPEED: f32 = 0.0;
/// Lowest speed in [`WriteMode::Follow`]; the write cursor must keep moving.
pub const MIN_FOLLOW_SPEED: f32 = 0.125;
pub const MAX_SPEED: f32 = 2.0;

pub const MAX_FEEDBACK: f32 = 1.5;
pub const MAX_GAIN: f32 = 4.0;
pub const DEFAULT_GAIN: f32 = 1.0;
pub const DEFAULT_MIX: f32 = 0.5;

pub const FILTER_MIN_HZ: f32 = 20.0;
pub const FILTER_MAX_HZ: f32 = 20_000.0;
/// At or above this smoothed cutoff the feedback filter is bypassed.
pub const FILTER_BYPASS_HZ: f32 = 18_000.0;

/// One-pole coefficient applied to every control target each sample.
pub const SMOOTHING_COEFF: f32 = 0.002;

/// Per-sample chance that drunk movement reverses direction.
pub const DRUNK_FLIP_PROBABILITY: f32 = 0.0005;

/// Length of seam and jump crossfades.
pub const FADE_SECONDS: f32 = 0.004;
/// Startup settle before buffering begins.
pub const SETTLE_SECONDS: f32 = 0.01;
/// Fraction of the recorded length within which the start control picks up the loop start.
pub const PICKUP_TOLERANCE: f32 = 0.01;
