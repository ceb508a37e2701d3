//! Cursor movement policies and boundary outcomes.

use rand::{Rng, RngCore};

use crate::DRUNK_FLIP_PROBABILITY;

/// Travel direction of a cursor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    /// +1 forward, -1 backward.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// How a read cursor moves through its loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Movement {
    /// Direction only changes on an explicit toggle.
    #[default]
    Normal,
    /// Direction flips at every loop edge.
    Pendulum,
    /// Direction has a small per-sample chance of flipping.
    Drunk,
    /// The cursor is redrawn to a random point in the loop at every loop edge.
    Random,
}

impl Movement {
    pub const ALL: [Movement; 4] = [
        Movement::Normal,
        Movement::Pendulum,
        Movement::Drunk,
        Movement::Random,
    ];

    /// Per-sample direction change, drawn before the cursor moves.
    pub fn flips_direction<R: RngCore + ?Sized>(self, rng: &mut R) -> bool {
        match self {
            Movement::Drunk => rng.gen::<f32>() < DRUNK_FLIP_PROBABILITY,
            Movement::Normal | Movement::Pendulum | Movement::Random => false,
        }
    }

    /// Reflect off loop edges instead of wrapping.
    pub fn reflects(self) -> bool {
        matches!(self, Movement::Pendulum)
    }

    /// Jump to a random offset after wrapping.
    pub fn redraws(self) -> bool {
        matches!(self, Movement::Random)
    }

    pub fn name(self) -> &'static str {
        match self {
            Movement::Normal => "normal",
            Movement::Pendulum => "pendulum",
            Movement::Drunk => "drunk",
            Movement::Random => "random",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

/// What happened at the loop edge during the last position update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Still inside the loop.
    None,
    /// Wrapped to the loop's other edge.
    Loop,
    /// Reflected off an edge; direction flipped.
    Invert,
    /// Reached an edge with looping disabled.
    Stop,
}

/// Shape of the loop region inside the recorded buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// `loop_end >= loop_start`: one contiguous span.
    Normal,
    /// The region runs through the buffer's physical end back to 0.
    Inverted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn direction_sign_and_reverse() {
        assert_eq!(Direction::Forward.sign(), 1.0);
        assert_eq!(Direction::Backward.sign(), -1.0);
        assert_eq!(Direction::Forward.reversed(), Direction::Backward);
    }

    #[test]
    fn only_drunk_flips() {
        // A zero draw is always below the flip probability.
        let mut rng = StepRng::new(0, 0);
        assert!(Movement::Drunk.flips_direction(&mut rng));
        assert!(!Movement::Normal.flips_direction(&mut rng));
        assert!(!Movement::Pendulum.flips_direction(&mut rng));
        assert!(!Movement::Random.flips_direction(&mut rng));
    }

    #[test]
    fn drunk_holds_on_high_draws() {
        let mut rng = StepRng::new(u64::MAX, 0);
        for _ in 0..100 {
            assert!(!Movement::Drunk.flips_direction(&mut rng));
        }
    }

    #[test]
    fn names_round_trip() {
        for m in Movement::ALL {
            assert_eq!(Movement::from_name(m.name()), Some(m));
        }
        assert_eq!(Movement::from_name("PENDULUM"), Some(Movement::Pendulum));
        assert_eq!(Movement::from_name("sideways"), None);
    }
}
