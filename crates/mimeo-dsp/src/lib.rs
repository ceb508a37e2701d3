//! Leaf DSP primitives for the mimeo looper.
//!
//! Everything here is allocation-free and runs on the audio path: stereo
//! frames, the equal-power crossfade curve, saturators, one-pole smoothing
//! and the crossfade state machine used to mask discontinuities.
//!
//! Designed to be `no_std` compatible.

#![cfg_attr(not(feature = "std"), no_std)]

mod curves;
mod fader;
mod frame;
mod smoothing;

pub use curves::{
    equal_crossfade, equal_crossfade_gains, saturate_asymmetric, soft_limit, CROSSFADE_K,
    CROSSFADE_POWER,
};
pub use fader::{FadeKind, FadeStatus, Fader};
pub use frame::Frame;
pub use smoothing::{OnePole, ToneFilter};
