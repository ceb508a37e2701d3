//! Head: one moving cursor over a recorded buffer.
//!
//! A head tracks a fractional position inside a loop region of the recorded
//! part of a buffer. The region is `[loop_start, loop_end]` where
//! `loop_end = (loop_start + loop_length - 1) mod recorded`; when the region
//! runs through the buffer's physical end the topology is *inverted*.
//!
//! Boundary handling works in loop-relative coordinates: the distance from
//! `loop_start` (wrapped through the buffer) plus the step. Values in
//! `[0, loop_length)` are inside the loop; anything at or past `loop_length`
//! overran `loop_end`, anything below 0 underran `loop_start`. All of it is
//! done on `f64` positions before truncation so fractional rates keep their
//! remainder across the seam.

use rand::RngCore;

use crate::movement::{Boundary, Direction, Movement, Topology};
use crate::MIN_LOOP_LENGTH_SAMPLES;

/// Wrap `x` into `[0, m)`.
pub(crate) fn wrap(x: f64, m: f64) -> f64 {
    if m <= 0.0 {
        return 0.0;
    }
    let r = x - m * libm::floor(x / m);
    // Rounding can land exactly on `m` for tiny negative inputs.
    if !(0.0..m).contains(&r) {
        0.0
    } else {
        r
    }
}

/// Linear interpolation at `position`, wrapping through the physical end of `buffer`.
pub fn read_linear(buffer: &[f32], position: f64) -> f32 {
    let n = buffer.len();
    if n == 0 {
        return 0.0;
    }
    let pos = wrap(position, n as f64);
    let lower = (libm::floor(pos) as usize).min(n - 1);
    let frac = (pos - lower as f64) as f32;
    let upper = if lower + 1 == n { 0 } else { lower + 1 };
    let a = buffer[lower];
    a + (buffer[upper] - a) * frac
}

#[derive(Clone, Debug)]
pub struct Head {
    position: f64,
    int_position: usize,
    rate: f64,
    loop_start: usize,
    loop_length: usize,
    buffer_samples: usize,
    direction: Direction,
    movement: Movement,
    looping: bool,
}

impl Default for Head {
    fn default() -> Self {
        Self::new()
    }
}

impl Head {
    pub const fn new() -> Self {
        Self {
            position: 0.0,
            int_position: 0,
            rate: 1.0,
            loop_start: 0,
            loop_length: 0,
            buffer_samples: 0,
            direction: Direction::Forward,
            movement: Movement::Normal,
            looping: true,
        }
    }

    /// Point the head at a freshly recorded buffer: position 0, loop covering everything.
    ///
    /// Rate, direction, movement and looping are control settings and survive.
    pub fn reset(&mut self, buffer_samples: usize) {
        self.buffer_samples = buffer_samples;
        self.loop_start = 0;
        self.loop_length = buffer_samples;
        self.position = 0.0;
        self.int_position = 0;
    }

    pub fn buffer_samples(&self) -> usize {
        self.buffer_samples
    }

    // --- Loop region ---

    /// Clamp to `[0, recorded)` and move the region's start.
    pub fn set_loop_start(&mut self, start: usize) {
        self.loop_start = start.min(self.buffer_samples.saturating_sub(1));
    }

    /// Clamp to `[MIN_LOOP_LENGTH_SAMPLES, recorded]`.
    pub fn set_loop_length(&mut self, length: usize) {
        self.loop_length = self.clamp_length(length);
    }

    fn clamp_length(&self, length: usize) -> usize {
        let max = self.buffer_samples;
        length.clamp(MIN_LOOP_LENGTH_SAMPLES.min(max), max)
    }

    pub fn loop_start(&self) -> usize {
        self.loop_start
    }

    /// Re-clamped on every read so a stale value cannot escape the recorded span.
    pub fn loop_length(&self) -> usize {
        self.clamp_length(self.loop_length)
    }

    pub fn loop_end(&self) -> usize {
        if self.buffer_samples == 0 {
            return 0;
        }
        (self.loop_start + self.loop_length().max(1) - 1) % self.buffer_samples
    }

    pub fn topology(&self) -> Topology {
        if self.loop_end() >= self.loop_start {
            Topology::Normal
        } else {
            Topology::Inverted
        }
    }

    /// Whether integer index `index` lies inside the loop region.
    pub fn contains(&self, index: usize) -> bool {
        if self.buffer_samples == 0 {
            return false;
        }
        let rel = (index + self.buffer_samples - self.loop_start % self.buffer_samples)
            % self.buffer_samples;
        rel < self.loop_length()
    }

    // --- Position ---

    /// Place the head at `index`, wrapped into the recorded span.
    pub fn set_index(&mut self, index: f64) {
        let n = self.buffer_samples as f64;
        self.position = if index.is_finite() { wrap(index, n) } else { 0.0 };
        self.int_position = self.index_of(self.position);
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn int_position(&self) -> usize {
        self.int_position
    }

    fn index_of(&self, position: f64) -> usize {
        (libm::floor(position) as usize).min(self.buffer_samples.saturating_sub(1))
    }

    // --- Motion settings ---

    /// Playback rate multiplier; negative or non-finite values clamp to 0.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = if rate.is_finite() { rate.max(0.0) } else { 0.0 };
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn toggle_direction(&mut self) {
        self.direction = self.direction.reversed();
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_movement(&mut self, movement: Movement) {
        self.movement = movement;
    }

    pub fn movement(&self) -> Movement {
        self.movement
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    // --- Per-sample update ---

    /// Advance by `rate` in the current direction and resolve the loop edges.
    pub fn update_position<R: RngCore + ?Sized>(&mut self, rng: &mut R) -> Boundary {
        if self.buffer_samples == 0 {
            return Boundary::None;
        }
        if self.movement.flips_direction(rng) {
            self.toggle_direction();
        }
        let step = self.rate * self.direction.sign();
        self.step_by(step)
    }

    /// Move by `step` samples (signed) and resolve the loop edges.
    pub fn step_by(&mut self, step: f64) -> Boundary {
        if self.buffer_samples == 0 {
            return Boundary::None;
        }
        let buffer = self.buffer_samples as f64;
        let start = self.loop_start as f64;
        let length = self.loop_length() as f64;
        let rel = wrap(self.position - start, buffer) + step;

        let (rel, outcome) = if rel >= length {
            let over = rel - length;
            if self.movement.reflects() && self.direction == Direction::Forward {
                self.direction = Direction::Backward;
                ((length - 2.0 - over).max(0.0), Boundary::Invert)
            } else {
                (wrap(over, length), self.wrap_outcome())
            }
        } else if rel < 0.0 {
            let under = -rel;
            if self.movement.reflects() && self.direction == Direction::Backward {
                self.direction = Direction::Forward;
                (under.min(length - 1.0), Boundary::Invert)
            } else {
                (wrap(length - under, length), self.wrap_outcome())
            }
        } else {
            (rel, Boundary::None)
        };

        self.position = wrap(start + rel, buffer);
        self.int_position = self.index_of(self.position);
        outcome
    }

    fn wrap_outcome(&self) -> Boundary {
        if self.looping {
            Boundary::Loop
        } else {
            Boundary::Stop
        }
    }

    // --- Buffer access ---

    /// Interpolated value at the head's position.
    pub fn read(&self, buffer: &[f32]) -> f32 {
        self.read_at(buffer, self.position)
    }

    /// Linear interpolation at fractional `index`.
    ///
    /// The bracketing pair is `floor(index)` and its successor inside the loop,
    /// so at `loop_end` the blend runs across the seam into `loop_start`
    /// instead of past the region. The pair and weights are the same in both
    /// directions.
    pub fn read_at(&self, buffer: &[f32], index: f64) -> f32 {
        let n = self.buffer_samples.min(buffer.len());
        if n == 0 {
            return 0.0;
        }
        let pos = wrap(index, n as f64);
        let lower = (libm::floor(pos) as usize).min(n - 1);
        let frac = (pos - lower as f64) as f32;
        if frac == 0.0 {
            return buffer[lower];
        }
        let upper = self.successor(lower).min(n - 1);
        buffer[lower] + (buffer[upper] - buffer[lower]) * frac
    }

    /// Next integer index after `index` going forward, wrapping `loop_end → loop_start`.
    fn successor(&self, index: usize) -> usize {
        if index == self.loop_end() && self.contains(index) {
            self.loop_start
        } else if index + 1 >= self.buffer_samples {
            0
        } else {
            index + 1
        }
    }

    /// Store `value` at the head's integer position.
    pub fn write(&self, buffer: &mut [f32], value: f32) {
        if let Some(cell) = buffer.get_mut(self.int_position) {
            *cell = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn head(buffer: usize, start: usize, length: usize) -> Head {
        let mut h = Head::new();
        h.reset(buffer);
        h.set_loop_start(start);
        h.set_loop_length(length);
        h
    }

    #[test]
    fn normal_loop_forward_step() {
        let mut h = head(1000, 0, 100);
        assert_eq!(h.loop_end(), 99);
        h.set_index(0.0);
        assert_eq!(h.update_position(&mut never()), Boundary::None);
        assert_eq!(h.position(), 1.0);
        assert_eq!(h.int_position(), 1);
    }

    #[test]
    fn normal_loop_forward_wraps_to_start() {
        let mut h = head(1000, 0, 100);
        h.set_index(99.0);
        assert_eq!(h.update_position(&mut never()), Boundary::Loop);
        assert_eq!(h.position(), 0.0);
        assert_eq!(h.int_position(), 0);
    }

    #[test]
    fn normal_loop_backward_wraps_to_end() {
        let mut h = head(1000, 0, 100);
        h.set_direction(Direction::Backward);
        h.set_index(0.0);
        assert_eq!(h.update_position(&mut never()), Boundary::Loop);
        assert_eq!(h.position(), 99.0);
        assert_eq!(h.int_position(), 99);

        h.set_index(99.0);
        assert_eq!(h.update_position(&mut never()), Boundary::None);
        assert_eq!(h.int_position(), 98);
    }

    #[test]
    fn half_speed_keeps_fraction() {
        let mut h = head(1000, 0, 100);
        h.set_rate(0.5);
        h.set_index(0.0);
        h.update_position(&mut never());
        assert_eq!(h.position(), 0.5);
        assert_eq!(h.int_position(), 0);

        h.set_index(99.0);
        assert_eq!(h.update_position(&mut never()), Boundary::None);
        assert_eq!(h.position(), 99.5);
        assert_eq!(h.int_position(), 99);

        assert_eq!(h.update_position(&mut never()), Boundary::Loop);
        assert_eq!(h.position(), 0.0);
    }

    #[test]
    fn odd_rate_carries_remainder_across_seam() {
        let mut h = head(1000, 0, 100);
        h.set_rate(1.5);
        h.set_index(98.5);
        assert_eq!(h.update_position(&mut never()), Boundary::Loop);
        assert_eq!(h.position(), 0.0);
        h.set_index(99.0);
        h.update_position(&mut never());
        assert_eq!(h.position(), 0.5);
    }

    #[test]
    fn inverted_loop_hard_wraps_at_buffer_end() {
        let mut h = head(48000, 40000, 10000);
        assert_eq!(h.topology(), Topology::Inverted);
        assert_eq!(h.loop_end(), 1999);
        h.set_index(47999.0);
        assert_eq!(h.update_position(&mut never()), Boundary::None);
        assert_eq!(h.int_position(), 0);
    }

    #[test]
    fn inverted_loop_dead_zone_snaps_to_start() {
        let mut h = head(48000, 40000, 10000);
        h.set_index(1999.0);
        assert_eq!(h.update_position(&mut never()), Boundary::Loop);
        assert_eq!(h.int_position(), 40000);
    }

    #[test]
    fn inverted_loop_backward_underrun() {
        let mut h = head(48000, 40000, 10000);
        h.set_direction(Direction::Backward);
        h.set_index(40000.0);
        assert_eq!(h.update_position(&mut never()), Boundary::Loop);
        assert_eq!(h.int_position(), 1999);

        h.set_index(0.0);
        assert_eq!(h.update_position(&mut never()), Boundary::None);
        assert_eq!(h.int_position(), 47999);
    }

    #[test]
    fn pendulum_reflects_at_both_edges() {
        let mut h = head(1000, 0, 100);
        h.set_movement(Movement::Pendulum);
        h.set_index(99.0);
        assert_eq!(h.update_position(&mut never()), Boundary::Invert);
        assert_eq!(h.position(), 98.0);
        assert_eq!(h.direction(), Direction::Backward);

        h.set_index(0.0);
        assert_eq!(h.update_position(&mut never()), Boundary::Invert);
        assert_eq!(h.position(), 1.0);
        assert_eq!(h.direction(), Direction::Forward);
    }

    #[test]
    fn pendulum_never_leaves_loop() {
        let mut h = head(500, 100, 60);
        h.set_movement(Movement::Pendulum);
        h.set_rate(1.7);
        h.set_index(100.0);
        let mut inverts = 0;
        for _ in 0..1000 {
            if h.update_position(&mut never()) == Boundary::Invert {
                inverts += 1;
            }
            assert!(h.contains(h.int_position()), "escaped at {}", h.position());
        }
        assert!(inverts > 20);
    }

    #[test]
    fn pendulum_reflects_in_inverted_loop() {
        let mut h = head(48000, 40000, 10000);
        h.set_movement(Movement::Pendulum);
        h.set_index(1999.0);
        assert_eq!(h.update_position(&mut never()), Boundary::Invert);
        assert_eq!(h.int_position(), 1998);
        assert_eq!(h.direction(), Direction::Backward);

        h.set_index(40000.0);
        assert_eq!(h.update_position(&mut never()), Boundary::Invert);
        assert_eq!(h.int_position(), 40001);
        assert_eq!(h.direction(), Direction::Forward);

        // Backward across the physical end stays inside the loop.
        h.set_direction(Direction::Backward);
        h.set_index(0.0);
        assert_eq!(h.update_position(&mut never()), Boundary::None);
        assert_eq!(h.int_position(), 47999);
    }

    #[test]
    fn pendulum_never_leaves_inverted_loop() {
        let mut h = head(48000, 40000, 10000);
        h.set_movement(Movement::Pendulum);
        h.set_rate(2.3);
        h.set_index(47000.0);
        let mut inverts = 0;
        for _ in 0..60_000 {
            if h.update_position(&mut never()) == Boundary::Invert {
                inverts += 1;
            }
            assert!(h.contains(h.int_position()), "escaped at {}", h.position());
        }
        assert!(inverts >= 10);
    }

    #[test]
    fn stop_reported_when_not_looping() {
        let mut h = head(1000, 0, 100);
        h.set_looping(false);
        h.set_index(99.0);
        assert_eq!(h.update_position(&mut never()), Boundary::Stop);
        assert_eq!(h.int_position(), 0);
    }

    #[test]
    fn drunk_flips_on_low_draw() {
        let mut h = head(1000, 0, 100);
        h.set_movement(Movement::Drunk);
        h.set_index(50.0);
        let mut always = StepRng::new(0, 0);
        h.update_position(&mut always);
        assert_eq!(h.direction(), Direction::Backward);
        assert_eq!(h.position(), 49.0);
        h.update_position(&mut never());
        assert_eq!(h.position(), 48.0);
    }

    #[test]
    fn loop_length_clamped_to_valid_range() {
        let mut h = head(1000, 0, 100);
        h.set_loop_length(0);
        assert_eq!(h.loop_length(), MIN_LOOP_LENGTH_SAMPLES);
        h.set_loop_length(5000);
        assert_eq!(h.loop_length(), 1000);
        h.set_loop_start(5000);
        assert_eq!(h.loop_start(), 999);
    }

    #[test]
    fn position_stays_in_range_after_shrinking_loop() {
        let mut h = head(1000, 0, 1000);
        h.set_index(900.0);
        h.set_loop_length(100);
        assert_eq!(h.update_position(&mut never()), Boundary::Loop);
        assert!(h.int_position() < 100);
    }

    #[test]
    fn set_index_wraps_into_buffer() {
        let mut h = head(1000, 0, 100);
        h.set_index(-1.0);
        assert_eq!(h.int_position(), 999);
        h.set_index(2500.5);
        assert_eq!(h.position(), 500.5);
    }

    #[test]
    fn read_interpolates_across_seam() {
        let mut buf = [0.0f32; 200];
        buf[0] = 1.0;
        buf[99] = 0.0;
        buf[100] = -1.0;
        let mut h = head(200, 0, 100);
        h.set_index(99.5);
        assert_eq!(h.read(&buf), 0.5);

        h.set_direction(Direction::Backward);
        assert_eq!(h.read(&buf), 0.5);
    }

    #[test]
    fn read_is_direction_independent_inside_loop() {
        let buf: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let mut h = head(100, 0, 100);
        let fwd = h.read_at(&buf, 10.25);
        h.set_direction(Direction::Backward);
        let bwd = h.read_at(&buf, 10.25);
        assert!((fwd - 10.25).abs() < 1e-6);
        assert!((bwd - 10.25).abs() < 1e-6);
    }

    #[test]
    fn write_uses_integer_position() {
        let mut buf = [0.0f32; 10];
        let mut h = head(10, 0, 10);
        h.set_index(3.7);
        h.write(&mut buf, 0.5);
        assert_eq!(buf[3], 0.5);
    }

    #[test]
    fn empty_head_is_inert() {
        let mut h = Head::new();
        assert_eq!(h.update_position(&mut never()), Boundary::None);
        assert_eq!(h.read(&[]), 0.0);
        assert_eq!(h.loop_end(), 0);
    }

    #[test]
    fn read_linear_wraps_physically() {
        let buf = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(read_linear(&buf, 3.5), 1.5);
        assert_eq!(read_linear(&buf, 5.0), 1.0);
    }
}
