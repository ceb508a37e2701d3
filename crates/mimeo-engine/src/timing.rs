//! Seconds ↔ samples conversion.

/// Round `seconds` to the nearest whole sample; negative and non-finite inputs give 0.
pub fn seconds_to_samples(seconds: f32, sample_rate: f32) -> usize {
    let samples = seconds * sample_rate;
    if samples.is_finite() && samples > 0.0 {
        libm::roundf(samples) as usize
    } else {
        0
    }
}

pub fn samples_to_seconds(samples: f64, sample_rate: f32) -> f32 {
    if sample_rate > 0.0 {
        (samples / sample_rate as f64) as f32
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_both_ways() {
        assert_eq!(seconds_to_samples(1.0, 48000.0), 48000);
        assert_eq!(seconds_to_samples(0.004, 48000.0), 192);
        assert_eq!(samples_to_seconds(24000.0, 48000.0), 0.5);
    }

    #[test]
    fn rejects_nonsense() {
        assert_eq!(seconds_to_samples(-1.0, 48000.0), 0);
        assert_eq!(seconds_to_samples(f32::NAN, 48000.0), 0);
        assert_eq!(samples_to_seconds(10.0, 0.0), 0.0);
    }
}
