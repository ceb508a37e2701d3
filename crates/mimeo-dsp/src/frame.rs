//! Audio frame type.

/// A stereo audio frame (32-bit float, nominal range [-1, 1]).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    pub const fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }

    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0.0, right: 0.0 }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: f32) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Apply `f` to both channels.
    pub fn map(self, mut f: impl FnMut(f32) -> f32) -> Self {
        Self {
            left: f(self.left),
            right: f(self.right),
        }
    }

    /// Scale both channels by `gain`.
    pub fn scaled(self, gain: f32) -> Self {
        self.map(|s| s * gain)
    }

    /// Largest absolute sample value of the two channels.
    pub fn peak(&self) -> f32 {
        libm::fabsf(self.left).max(libm::fabsf(self.right))
    }

    /// Convert to 16-bit PCM, clamping out-of-range values.
    pub fn to_i16(self) -> (i16, i16) {
        let conv = |s: f32| (s.clamp(-1.0, 1.0) * 32767.0) as i16;
        (conv(self.left), conv(self.right))
    }

    /// Build from 16-bit PCM.
    pub fn from_i16(left: i16, right: i16) -> Self {
        Self {
            left: left as f32 / 32768.0,
            right: right as f32 / 32768.0,
        }
    }
}
