//! One-pole filters: parameter smoothing and the feedback tone filter.

use core::f32::consts::TAU;

/// One-pole smoother: `y += coeff * (target - y)` once per sample.
#[derive(Clone, Copy, Debug)]
pub struct OnePole {
    value: f32,
    coeff: f32,
}

impl OnePole {
    pub fn new(initial: f32, coeff: f32) -> Self {
        Self {
            value: initial,
            coeff: coeff.clamp(0.0, 1.0),
        }
    }

    /// Move one step toward `target` and return the new value.
    pub fn process(&mut self, target: f32) -> f32 {
        self.value += self.coeff * (target - self.value);
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Jump straight to `value`.
    pub fn reset(&mut self, value: f32) {
        self.value = value;
    }
}

/// One-pole RC low-pass: `y = y_prev + alpha * (x - y_prev)`.
#[derive(Clone, Copy, Debug)]
pub struct ToneFilter {
    state: f32,
    alpha: f32,
    cutoff_hz: f32,
    sample_rate: f32,
}

impl ToneFilter {
    pub fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        let mut f = Self {
            state: 0.0,
            alpha: 1.0,
            cutoff_hz,
            sample_rate: sample_rate.max(1.0),
        };
        f.recompute_alpha();
        f
    }

    /// Change the cutoff. Recomputes the coefficient only when the value moved.
    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        let nyquist = self.sample_rate * 0.5;
        let hz = cutoff_hz.clamp(1.0, nyquist);
        if hz != self.cutoff_hz {
            self.cutoff_hz = hz;
            self.recompute_alpha();
        }
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    fn recompute_alpha(&mut self) {
        self.alpha = 1.0 - libm::expf(-TAU * self.cutoff_hz / self.sample_rate);
    }

    pub fn process(&mut self, x: f32) -> f32 {
        self.state += self.alpha * (x - self.state);
        self.state
    }

    /// Follow `x` without filtering so engaging the filter later does not jump.
    pub fn track(&mut self, x: f32) -> f32 {
        self.state = x;
        x
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}
