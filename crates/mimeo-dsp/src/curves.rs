//! Static transfer curves: equal-power crossfade and saturators.

/// Power of the crossfade curve. 2 keeps the summed energy of the blend constant.
pub const CROSSFADE_POWER: f32 = 2.0;

/// Polynomial correction term for `CROSSFADE_POWER`.
pub const CROSSFADE_K: f32 =
    -6.002_660_8 + CROSSFADE_POWER * (6.877_351_2 - 1.583_810_4 * CROSSFADE_POWER);

/// Negative half-wave drive of the input saturator, relative to the positive half.
const NEGATIVE_DRIVE: f32 = 0.8;

/// Gains `(from, to)` of the equal-power crossfade at `pos` in [0, 1].
///
/// Two-term polynomial approximation of a power-complementary pair:
/// `from² + to² ≈ 1` across the whole range, exact at both ends.
pub fn equal_crossfade_gains(pos: f32) -> (f32, f32) {
    let x = pos.clamp(0.0, 1.0);
    let y = 1.0 - x;
    let a = x * y;
    let b = a * (1.0 + CROSSFADE_K * a);
    let c = b + x;
    let d = b + y;
    (d * d, c * c)
}

/// Blend `from` into `to` at `pos` (0 = all `from`, 1 = all `to`).
pub fn equal_crossfade(from: f32, to: f32, pos: f32) -> f32 {
    let (g_from, g_to) = equal_crossfade_gains(pos);
    from * g_from + to * g_to
}

/// Saturating limiter for the feedback path. Output is always inside (-1, 1).
pub fn soft_limit(x: f32) -> f32 {
    libm::tanhf(x)
}

/// Asymmetric soft saturation for input gain shaping.
///
/// The negative half-wave is driven less than the positive one, which adds a
/// little even-harmonic colour when the input gain is pushed.
pub fn saturate_asymmetric(x: f32) -> f32 {
    if x >= 0.0 {
        libm::tanhf(x)
    } else {
        libm::tanhf(x * NEGATIVE_DRIVE) / NEGATIVE_DRIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn crossfade_endpoints_are_exact() {
        assert_eq!(equal_crossfade(0.3, -0.6, 0.0), 0.3);
        assert_eq!(equal_crossfade(0.3, -0.6, 1.0), -0.6);
    }

    #[test]
    fn crossfade_preserves_power() {
        for i in 0..=20 {
            let (a, b) = equal_crossfade_gains(i as f32 / 20.0);
            assert_abs_diff_eq!(a * a + b * b, 1.0, epsilon = 0.02);
        }
    }

    #[test]
    fn crossfade_is_symmetric() {
        let (a, b) = equal_crossfade_gains(0.5);
        assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        let (a1, b1) = equal_crossfade_gains(0.2);
        let (a2, b2) = equal_crossfade_gains(0.8);
        assert_abs_diff_eq!(a1, b2, epsilon = 1e-6);
        assert_abs_diff_eq!(b1, a2, epsilon = 1e-6);
    }

    #[test]
    fn crossfade_clamps_position() {
        assert_eq!(equal_crossfade(1.0, 0.0, -3.0), 1.0);
        assert_eq!(equal_crossfade(1.0, 0.0, 7.0), 0.0);
    }

    #[test]
    fn soft_limit_bounds_large_values() {
        assert!(soft_limit(1000.0) <= 1.0);
        assert!(soft_limit(-1000.0) >= -1.0);
        assert_eq!(soft_limit(0.0), 0.0);
    }

    #[test]
    fn asymmetric_saturation_differs_by_sign() {
        let pos = saturate_asymmetric(2.0);
        let neg = saturate_asymmetric(-2.0);
        assert!(pos > 0.0 && neg < 0.0);
        assert!(neg.abs() > pos.abs());
        assert_eq!(saturate_asymmetric(0.0), 0.0);
    }
}
