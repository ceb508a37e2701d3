//! StereoLooper: two Loopers behind one per-frame entry point.
//!
//! Per frame: smooth the control targets, shape the input
//! (`saturate_asymmetric(x * gain)`), read both loopers, run the feedback
//! tone filter, route feedback according to the link mode, write, advance,
//! and blend dry against wet with the equal-power curve.

use mimeo_dsp::{equal_crossfade, saturate_asymmetric, Frame, OnePole, ToneFilter};
use rand::rngs::SmallRng;
use rand::RngCore;

use crate::looper::{Looper, WriteMode};
use crate::movement::{Direction, Movement};
use crate::processor::BlockProcessor;
use crate::{
    DEFAULT_GAIN, DEFAULT_MIX, FILTER_BYPASS_HZ, FILTER_MAX_HZ, FILTER_MIN_HZ, MAX_FEEDBACK,
    MAX_GAIN, SMOOTHING_COEFF,
};

const LEFT_SEED: u64 = 0x4c45_4654;
const RIGHT_SEED: u64 = 0x5249_4748_54;

/// How the two channels relate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LinkMode {
    /// Independent channels.
    #[default]
    Mono,
    /// Each channel's read feeds the other channel's write.
    Cross,
    /// Right follows left; per-channel controls apply to both.
    Dual,
}

impl LinkMode {
    pub const ALL: [LinkMode; 3] = [LinkMode::Mono, LinkMode::Cross, LinkMode::Dual];

    pub fn name(self) -> &'static str {
        match self {
            LinkMode::Mono => "mono",
            LinkMode::Cross => "cross",
            LinkMode::Dual => "dual",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

/// Target of a per-channel control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
    Both,
}

/// State transitions requested between blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Requests {
    pub toggle_freeze: bool,
    pub stop_buffering: bool,
    pub reset_buffer: bool,
    pub restart: bool,
    pub toggle_direction: bool,
}

impl Requests {
    pub fn is_empty(&self) -> bool {
        *self == Requests::default()
    }
}

/// A smoothed control: the UI writes `target`, the audio path reads `smoother`.
#[derive(Clone, Copy, Debug)]
struct Control {
    target: f32,
    smoother: OnePole,
}

impl Control {
    fn new(value: f32) -> Self {
        Self {
            target: value,
            smoother: OnePole::new(value, SMOOTHING_COEFF),
        }
    }

    fn next(&mut self) -> f32 {
        self.smoother.process(self.target)
    }
}

pub struct StereoLooper<'a, R = SmallRng> {
    left: Looper<'a, R>,
    right: Looper<'a, R>,
    link: LinkMode,
    gain: Control,
    mix: Control,
    feedback: Control,
    cutoff: Control,
    filters: [ToneFilter; 2],
    requests: Requests,
}

impl<'a> StereoLooper<'a, SmallRng> {
    pub fn new(left: &'a mut [f32], right: &'a mut [f32], sample_rate: f32) -> Self {
        Self::from_loopers(
            Looper::with_seed(left, sample_rate, LEFT_SEED),
            Looper::with_seed(right, sample_rate, RIGHT_SEED),
        )
    }
}

impl<'a, R: RngCore> StereoLooper<'a, R> {
    pub fn from_loopers(left: Looper<'a, R>, right: Looper<'a, R>) -> Self {
        let sample_rate = left.sample_rate();
        Self {
            left,
            right,
            link: LinkMode::Mono,
            gain: Control::new(DEFAULT_GAIN),
            mix: Control::new(DEFAULT_MIX),
            feedback: Control::new(0.0),
            cutoff: Control::new(FILTER_MAX_HZ),
            filters: [
                ToneFilter::new(FILTER_MAX_HZ, sample_rate),
                ToneFilter::new(FILTER_MAX_HZ, sample_rate),
            ],
            requests: Requests::default(),
        }
    }

    /// One stereo frame in, one out.
    pub fn process(&mut self, frame: Frame) -> Frame {
        let gain = self.gain.next();
        let mix = self.mix.next();
        let feedback = self.feedback.next();
        let cutoff = self.cutoff.next();

        let input = frame.map(|x| saturate_asymmetric(x * gain));
        self.left.set_feedback(feedback);
        self.right.set_feedback(feedback);

        let monitor_left = self.left.is_buffering();
        let monitor_right = self.right.is_buffering();
        let wet_left = self.left.read();
        let wet_right = self.right.read();

        let [fb_left, fb_right] = self.tone([wet_left, wet_right], cutoff);
        let (src_left, src_right) = match self.link {
            LinkMode::Cross => (fb_right, fb_left),
            LinkMode::Mono | LinkMode::Dual => (fb_left, fb_right),
        };
        self.left.write(input.left, src_left);
        self.right.write(input.right, src_right);
        self.left.advance();
        self.right.advance();

        let wet = Frame::new(
            if monitor_left { input.left } else { wet_left },
            if monitor_right { input.right } else { wet_right },
        );
        Frame::new(
            equal_crossfade(frame.left, wet.left, mix),
            equal_crossfade(frame.right, wet.right, mix),
        )
    }

    /// Feedback tone filter; bypassed (tracking its input) at high cutoffs.
    fn tone(&mut self, wet: [f32; 2], cutoff: f32) -> [f32; 2] {
        let bypass = cutoff >= FILTER_BYPASS_HZ;
        let mut out = wet;
        for (filter, x) in self.filters.iter_mut().zip(out.iter_mut()) {
            if bypass {
                filter.track(*x);
            } else {
                filter.set_cutoff(cutoff);
                *x = filter.process(*x);
            }
        }
        out
    }

    /// Apply pending requests, then process every frame.
    pub fn render(&mut self, input: &[Frame], output: &mut [Frame]) {
        self.apply_requests();
        for (i, o) in input.iter().zip(output.iter_mut()) {
            *o = self.process(*i);
        }
    }

    fn apply_requests(&mut self) {
        let r = core::mem::take(&mut self.requests);
        if r.reset_buffer {
            self.reset_buffer();
        }
        if r.stop_buffering {
            self.stop_buffering();
        }
        if r.toggle_freeze {
            self.toggle_freeze();
        }
        if r.restart {
            self.restart();
        }
        if r.toggle_direction {
            self.toggle_direction(Channel::Both);
        }
    }

    // --- Requests (applied at the start of the next block) ---

    pub fn request(&mut self, requests: Requests) {
        let r = &mut self.requests;
        r.toggle_freeze ^= requests.toggle_freeze;
        r.stop_buffering |= requests.stop_buffering;
        r.reset_buffer |= requests.reset_buffer;
        r.restart |= requests.restart;
        r.toggle_direction ^= requests.toggle_direction;
    }

    pub fn request_toggle_freeze(&mut self) {
        self.requests.toggle_freeze = !self.requests.toggle_freeze;
    }

    pub fn request_stop_buffering(&mut self) {
        self.requests.stop_buffering = true;
    }

    pub fn request_reset_buffer(&mut self) {
        self.requests.reset_buffer = true;
    }

    pub fn request_restart(&mut self) {
        self.requests.restart = true;
    }

    pub fn request_toggle_direction(&mut self) {
        self.requests.toggle_direction = !self.requests.toggle_direction;
    }

    pub fn pending_requests(&self) -> Requests {
        self.requests
    }

    // --- Immediate transitions (both channels) ---

    pub fn toggle_freeze(&mut self) {
        self.left.toggle_freeze();
        self.right.toggle_freeze();
    }

    pub fn stop_buffering(&mut self) {
        self.left.stop_buffering();
        self.right.stop_buffering();
    }

    pub fn reset_buffer(&mut self) {
        self.left.reset_buffer();
        self.right.reset_buffer();
        for f in &mut self.filters {
            f.reset();
        }
    }

    pub fn restart(&mut self) {
        self.left.restart();
        self.right.restart();
    }

    // --- Global smoothed controls ---

    pub fn set_gain(&mut self, gain: f32) {
        self.gain.target = clamp_or(gain, 0.0, MAX_GAIN, DEFAULT_GAIN);
    }

    pub fn set_mix(&mut self, mix: f32) {
        self.mix.target = clamp_or(mix, 0.0, 1.0, DEFAULT_MIX);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback.target = clamp_or(feedback, 0.0, MAX_FEEDBACK, 0.0);
    }

    pub fn set_filter(&mut self, cutoff_hz: f32) {
        self.cutoff.target = clamp_or(cutoff_hz, FILTER_MIN_HZ, FILTER_MAX_HZ, FILTER_MAX_HZ);
    }

    pub fn set_link_mode(&mut self, mode: LinkMode) {
        if mode == self.link {
            return;
        }
        self.link = mode;
        if mode == LinkMode::Dual {
            self.right.follow(&self.left);
        }
    }

    // --- Per-channel controls ---

    fn each_linked(&mut self, channel: Channel, mut f: impl FnMut(&mut Looper<'a, R>)) {
        let channel = if self.link == LinkMode::Dual {
            Channel::Both
        } else {
            channel
        };
        match channel {
            Channel::Left => f(&mut self.left),
            Channel::Right => f(&mut self.right),
            Channel::Both => {
                f(&mut self.left);
                f(&mut self.right);
            }
        }
    }

    pub fn set_speed(&mut self, channel: Channel, speed: f32) {
        self.each_linked(channel, |l| l.set_speed(speed));
    }

    pub fn set_movement(&mut self, channel: Channel, movement: Movement) {
        self.each_linked(channel, |l| l.set_movement(movement));
    }

    pub fn set_direction(&mut self, channel: Channel, direction: Direction) {
        self.each_linked(channel, |l| l.set_direction(direction));
    }

    pub fn toggle_direction(&mut self, channel: Channel) {
        self.each_linked(channel, |l| l.toggle_direction());
    }

    pub fn set_write_mode(&mut self, channel: Channel, mode: WriteMode) {
        self.each_linked(channel, |l| l.set_mode(mode));
    }

    pub fn set_looping(&mut self, channel: Channel, looping: bool) {
        self.each_linked(channel, |l| l.set_looping(looping));
    }

    pub fn set_loop_start(&mut self, channel: Channel, start: usize) {
        self.each_linked(channel, |l| l.set_loop_start(start));
    }

    pub fn set_loop_length(&mut self, channel: Channel, length: usize) {
        self.each_linked(channel, |l| l.set_loop_length(length));
    }

    pub fn set_loop_start_seconds(&mut self, channel: Channel, seconds: f32) {
        self.each_linked(channel, |l| l.set_loop_start_seconds(seconds));
    }

    pub fn set_loop_length_seconds(&mut self, channel: Channel, seconds: f32) {
        self.each_linked(channel, |l| l.set_loop_length_seconds(seconds));
    }

    // --- Telemetry ---

    pub fn left(&self) -> &Looper<'a, R> {
        &self.left
    }

    pub fn right(&self) -> &Looper<'a, R> {
        &self.right
    }

    /// The looper addressed by `channel`; `Both` reports the left one.
    pub fn looper(&self, channel: Channel) -> &Looper<'a, R> {
        match channel {
            Channel::Left | Channel::Both => &self.left,
            Channel::Right => &self.right,
        }
    }

    pub fn link_mode(&self) -> LinkMode {
        self.link
    }

    pub fn gain(&self) -> f32 {
        self.gain.target
    }

    pub fn mix(&self) -> f32 {
        self.mix.target
    }

    pub fn feedback(&self) -> f32 {
        self.feedback.target
    }

    pub fn filter(&self) -> f32 {
        self.cutoff.target
    }

    /// Smoothed cutoff currently applied on the audio path.
    pub fn filter_smoothed(&self) -> f32 {
        self.cutoff.smoother.value()
    }

    pub fn is_frozen(&self) -> bool {
        self.left.is_frozen()
    }

    pub fn is_buffering(&self) -> bool {
        self.left.is_buffering() || self.right.is_buffering()
    }
}

impl<R: RngCore> BlockProcessor for StereoLooper<'_, R> {
    fn sample_rate(&self) -> f32 {
        self.left.sample_rate()
    }

    fn process_block(&mut self, input: &[Frame], output: &mut [Frame]) {
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.render(input, output));
        #[cfg(not(feature = "alloc_check"))]
        self.render(input, output);
    }
}

fn clamp_or(x: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if x.is_finite() {
        x.clamp(min, max)
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::looper::LooperState;
    use approx::assert_abs_diff_eq;

    const SR: f32 = 48_000.0;

    fn run(s: &mut StereoLooper<'_>, n: usize, input: Frame) -> Frame {
        let mut out = Frame::silence();
        for _ in 0..n {
            out = s.process(input);
        }
        out
    }

    /// Settle, buffer `n` frames of `input`, then stop buffering.
    fn recorded(s: &mut StereoLooper<'_>, n: usize, input: Frame) {
        run(s, 481, Frame::silence());
        assert_eq!(s.left().state(), LooperState::Buffering);
        run(s, n, input);
        s.stop_buffering();
    }

    #[test]
    fn dry_only_at_zero_mix() {
        let (mut l, mut r) = (vec![0.0; 4800], vec![0.0; 4800]);
        let mut s = StereoLooper::new(&mut l, &mut r, SR);
        s.set_mix(0.0);
        s.mix.smoother.reset(0.0);
        let out = run(&mut s, 100, Frame::new(0.3, -0.2));
        assert_abs_diff_eq!(out.left, 0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(out.right, -0.2, epsilon = 1e-6);
    }

    #[test]
    fn monitors_input_while_buffering() {
        let (mut l, mut r) = (vec![0.0; 48_000], vec![0.0; 48_000]);
        let mut s = StereoLooper::new(&mut l, &mut r, SR);
        s.mix.smoother.reset(1.0);
        s.set_mix(1.0);
        let out = run(&mut s, 1000, Frame::mono(0.25));
        assert!(s.is_buffering());
        assert_abs_diff_eq!(out.left, saturate_asymmetric(0.25), epsilon = 1e-6);
    }

    #[test]
    fn cross_mode_swaps_feedback_paths() {
        let (mut l, mut r) = (vec![0.0; 1000], vec![0.0; 1000]);
        let mut s = StereoLooper::new(&mut l, &mut r, SR);
        recorded(&mut s, 100, Frame::new(0.5, 0.0));
        s.set_link_mode(LinkMode::Cross);
        s.set_feedback(1.0);
        s.feedback.smoother.reset(1.0);
        run(&mut s, 100, Frame::silence());
        // The right buffer now holds the left channel's loop.
        assert!(s.right().recording().iter().all(|&x| x > 0.3));
        assert!(s.left().recording().iter().all(|&x| x.abs() < 1e-6));
    }

    #[test]
    fn mono_mode_keeps_channels_separate() {
        let (mut l, mut r) = (vec![0.0; 1000], vec![0.0; 1000]);
        let mut s = StereoLooper::new(&mut l, &mut r, SR);
        recorded(&mut s, 100, Frame::new(0.5, 0.0));
        s.set_feedback(1.0);
        s.feedback.smoother.reset(1.0);
        run(&mut s, 100, Frame::silence());
        assert!(s.right().recording().iter().all(|&x| x.abs() < 1e-6));
        assert!(s.left().recording().iter().all(|&x| x > 0.3));
    }

    #[test]
    fn dual_mode_locks_right_to_left() {
        let (mut l, mut r) = (vec![0.0; 1000], vec![0.0; 1000]);
        let mut s = StereoLooper::new(&mut l, &mut r, SR);
        recorded(&mut s, 800, Frame::silence());
        s.set_speed(Channel::Left, 0.5);
        s.set_loop_length(Channel::Left, 300);
        assert_eq!(s.right().speed(), 1.0);

        s.set_link_mode(LinkMode::Dual);
        assert_eq!(s.right().speed(), 0.5);
        assert_eq!(s.right().loop_length(), 300);

        s.set_movement(Channel::Right, Movement::Pendulum);
        assert_eq!(s.left().movement(), Movement::Pendulum);
    }

    #[test]
    fn per_channel_setters_target_one_side() {
        let (mut l, mut r) = (vec![0.0; 1000], vec![0.0; 1000]);
        let mut s = StereoLooper::new(&mut l, &mut r, SR);
        s.set_speed(Channel::Right, 2.0);
        assert_eq!(s.left().speed(), 1.0);
        assert_eq!(s.right().speed(), 2.0);
        s.set_direction(Channel::Both, Direction::Backward);
        assert_eq!(s.looper(Channel::Left).direction(), Direction::Backward);
        assert_eq!(s.looper(Channel::Right).direction(), Direction::Backward);
    }

    #[test]
    fn requests_apply_at_next_block() {
        let (mut l, mut r) = (vec![0.0; 1000], vec![0.0; 1000]);
        let mut s = StereoLooper::new(&mut l, &mut r, SR);
        recorded(&mut s, 200, Frame::silence());
        s.request_toggle_freeze();
        assert!(!s.is_frozen());
        assert!(!s.pending_requests().is_empty());

        let input = [Frame::silence(); 16];
        let mut output = [Frame::silence(); 16];
        s.process_block(&input, &mut output);
        assert!(s.is_frozen());
        assert!(s.pending_requests().is_empty());
    }

    #[test]
    fn double_freeze_request_cancels() {
        let (mut l, mut r) = (vec![0.0; 1000], vec![0.0; 1000]);
        let mut s = StereoLooper::new(&mut l, &mut r, SR);
        recorded(&mut s, 200, Frame::silence());
        s.request_toggle_freeze();
        s.request_toggle_freeze();
        s.process_block(&[Frame::silence(); 4], &mut [Frame::silence(); 4]);
        assert!(!s.is_frozen());
    }

    #[test]
    fn controls_are_clamped() {
        let (mut l, mut r) = (vec![0.0; 100], vec![0.0; 100]);
        let mut s = StereoLooper::new(&mut l, &mut r, SR);
        s.set_gain(100.0);
        s.set_mix(-1.0);
        s.set_feedback(f32::NAN);
        s.set_filter(1.0);
        assert_eq!(s.gain(), MAX_GAIN);
        assert_eq!(s.mix(), 0.0);
        assert_eq!(s.feedback(), 0.0);
        assert_eq!(s.filter(), FILTER_MIN_HZ);
    }

    #[test]
    fn controls_are_smoothed() {
        let (mut l, mut r) = (vec![0.0; 100], vec![0.0; 100]);
        let mut s = StereoLooper::new(&mut l, &mut r, SR);
        s.set_filter(FILTER_MIN_HZ);
        s.process(Frame::silence());
        assert!(s.filter_smoothed() > 19_000.0);
        run(&mut s, 20_000, Frame::silence());
        assert_abs_diff_eq!(s.filter_smoothed(), FILTER_MIN_HZ, epsilon = 1.0);
    }

    #[test]
    fn low_cutoff_darkens_feedback() {
        let (mut l, mut r) = (vec![0.0; 1000], vec![0.0; 1000]);
        let mut s = StereoLooper::new(&mut l, &mut r, SR);
        // Alternating samples: energy at Nyquist.
        run(&mut s, 481, Frame::silence());
        for i in 0..200 {
            let x = if i % 2 == 0 { 0.5 } else { -0.5 };
            s.process(Frame::mono(x));
        }
        s.stop_buffering();
        s.set_filter(FILTER_MIN_HZ);
        s.cutoff.smoother.reset(FILTER_MIN_HZ);
        s.set_feedback(1.0);
        s.feedback.smoother.reset(1.0);
        run(&mut s, 200, Frame::silence());
        let peak = s.left().recording().iter().fold(0.0f32, |m, x| m.max(x.abs()));
        assert!(peak < 0.1, "peak {}", peak);
    }

    #[test]
    fn output_is_bounded_with_hot_input_and_feedback() {
        let (mut l, mut r) = (vec![0.0; 2000], vec![0.0; 2000]);
        let mut s = StereoLooper::new(&mut l, &mut r, SR);
        s.set_gain(MAX_GAIN);
        s.set_feedback(MAX_FEEDBACK);
        s.set_mix(1.0);
        for i in 0..20_000 {
            let x = if (i / 50) % 2 == 0 { 1.0 } else { -1.0 };
            let out = s.process(Frame::mono(x));
            assert!(out.peak() < 2.0);
        }
    }
}
