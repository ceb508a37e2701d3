//! Crossfade state machine.
//!
//! A `Fader` blends two signal streams over a fixed number of samples using
//! the equal-power curve from [`crate::curves`]. A `Single` fade goes from the
//! first stream to the second once. An `OutIn` fade runs two legs: the first
//! goes `from → to`, then the sources swap and the second leg goes back
//! `to → from`. Callers use the swap point (see [`Fader::crossed_midpoint`])
//! to perform a discontinuous jump while the signal is faded out.

use crate::curves::equal_crossfade;

/// Smallest index increment accepted by [`Fader::init`].
const MIN_RATE: f32 = 1.0e-3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FadeKind {
    /// One leg, `from → to`.
    #[default]
    Single,
    /// Two legs, `from → to → from`.
    OutIn,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FadeStatus {
    /// Never armed.
    #[default]
    Created,
    /// Armed; starts on the next `process` call.
    Pending,
    Fading,
    Ended,
}

#[derive(Clone, Debug, Default)]
pub struct Fader {
    kind: FadeKind,
    status: FadeStatus,
    index: f32,
    samples: f32,
    rate: f32,
    swapped: bool,
    midpoint: bool,
    output: f32,
}

impl Fader {
    pub const fn new() -> Self {
        Self {
            kind: FadeKind::Single,
            status: FadeStatus::Created,
            index: 0.0,
            samples: 1.0,
            rate: 1.0,
            swapped: false,
            midpoint: false,
            output: 0.0,
        }
    }

    /// Arm a fade of `samples` length advancing by `rate` per call.
    ///
    /// Only takes effect from `Created` or `Ended`; re-arming a fade that is
    /// pending or in progress is ignored. Returns whether the fade was armed.
    pub fn init(&mut self, kind: FadeKind, samples: usize, rate: f32) -> bool {
        if self.is_active() {
            return false;
        }
        self.kind = kind;
        self.samples = samples.max(1) as f32;
        self.rate = if rate.is_finite() { rate.max(MIN_RATE) } else { 1.0 };
        self.index = 0.0;
        self.swapped = false;
        self.midpoint = false;
        self.status = FadeStatus::Pending;
        true
    }

    /// Advance the fade by one step and compute the blended output.
    pub fn process(&mut self, from: f32, to: f32) -> FadeStatus {
        self.midpoint = false;
        match self.status {
            FadeStatus::Created => {
                self.output = from;
                return self.status;
            }
            FadeStatus::Ended => {
                self.output = match self.kind {
                    FadeKind::Single => to,
                    FadeKind::OutIn => from,
                };
                return self.status;
            }
            FadeStatus::Pending => self.status = FadeStatus::Fading,
            FadeStatus::Fading => {}
        }

        let (a, b) = if self.swapped { (to, from) } else { (from, to) };
        self.output = equal_crossfade(a, b, self.index / self.samples);

        self.index += self.rate;
        if self.index >= self.samples {
            if self.kind == FadeKind::OutIn && !self.swapped {
                self.swapped = true;
                self.midpoint = true;
                self.index = 0.0;
            } else {
                self.status = FadeStatus::Ended;
            }
        }
        self.status
    }

    /// Output of the last `process` call.
    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn status(&self) -> FadeStatus {
        self.status
    }

    pub fn kind(&self) -> FadeKind {
        self.kind
    }

    pub fn index(&self) -> f32 {
        self.index
    }

    /// Pending or fading.
    pub fn is_active(&self) -> bool {
        matches!(self.status, FadeStatus::Pending | FadeStatus::Fading)
    }

    /// True only on the `process` call that completed the first leg of an `OutIn` fade.
    pub fn crossed_midpoint(&self) -> bool {
        self.midpoint
    }

    /// Turn an `OutIn` fade that is in its second leg back into its first
    /// leg, at the point with the same gain. The next midpoint then fires
    /// again. Returns false when there is no second leg to rewind.
    pub fn rewind_to_first_leg(&mut self) -> bool {
        if !self.is_active() || self.kind != FadeKind::OutIn || !self.swapped {
            return false;
        }
        self.swapped = false;
        self.index = (self.samples - self.index).max(0.0);
        true
    }

    /// Abort any fade in progress.
    pub fn cancel(&mut self) {
        if self.is_active() {
            self.status = FadeStatus::Ended;
        }
        self.midpoint = false;
    }
}
