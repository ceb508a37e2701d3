//! Looper: one channel's buffer, cursors and record/freeze state machine.
//!
//! States run `Init → Buffering → Recording ⇄ Frozen`. `Init` waits out a
//! short settle period. `Buffering` appends input until the buffer is full
//! or buffering is stopped; that length becomes the recorded span. From then
//! on the read cursor loops over the recorded span and, unless frozen, the
//! write cursor overdubs `soft_limit(dry + feedback_source * feedback)`.
//!
//! Discontinuities are masked with two faders: a single-leg seam fade from a
//! "ghost" cursor that keeps running past the loop edge into the wrapped
//! cursor, and an out-in fade around jumps (restart, random redraw, channel
//! lock) that moves the cursor while the output is faded down.

use mimeo_dsp::{soft_limit, FadeKind, Fader};
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::head::{read_linear, Head};
use crate::movement::{Boundary, Direction, Movement, Topology};
use crate::timing::{samples_to_seconds, seconds_to_samples};
use crate::{
    FADE_SECONDS, MAX_FEEDBACK, MAX_SPEED, MIN_FOLLOW_SPEED, MIN_LOOP_LENGTH_SAMPLES, MIN_SPEED,
    PICKUP_TOLERANCE, SETTLE_SECONDS,
};

const DEFAULT_SEED: u64 = 0x6d69_6d65_6f00_0001;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LooperState {
    #[default]
    Init,
    Buffering,
    Recording,
    Frozen,
}

/// How the write cursor moves once the buffer is recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum WriteMode {
    /// Always forward at unity rate, independent of the read cursor.
    #[default]
    Fixed,
    /// Writes where the read cursor is.
    Follow,
}

impl WriteMode {
    pub fn min_speed(self) -> f32 {
        match self {
            WriteMode::Fixed => MIN_SPEED,
            WriteMode::Follow => MIN_FOLLOW_SPEED,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WriteMode::Fixed => "fixed",
            WriteMode::Follow => "follow",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [WriteMode::Fixed, WriteMode::Follow]
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(name))
    }
}

pub struct Looper<'a, R = SmallRng> {
    buffer: &'a mut [f32],
    recorded: usize,
    sample_rate: f32,
    state: LooperState,
    settle_remaining: usize,
    stop_requested: bool,

    write_head: Head,
    read_head: Head,
    write_mode: WriteMode,
    speed: f32,
    feedback: f32,
    /// Requested loop length; `None` covers the whole recording.
    length_request: Option<usize>,
    /// Start control while frozen; applied once it has picked up the loop start.
    start_control: usize,
    picked_up: bool,
    playing: bool,

    fade_samples: usize,
    seam: Fader,
    ghost: f64,
    ghost_step: f64,
    jump: Fader,
    pending_jump: Option<f64>,

    rng: R,
}

impl<'a> Looper<'a, SmallRng> {
    /// A looper over `buffer` with a fixed-seed random source.
    pub fn new(buffer: &'a mut [f32], sample_rate: f32) -> Self {
        Self::with_seed(buffer, sample_rate, DEFAULT_SEED)
    }

    pub fn with_seed(buffer: &'a mut [f32], sample_rate: f32, seed: u64) -> Self {
        Self::with_rng(buffer, sample_rate, SmallRng::seed_from_u64(seed))
    }
}

impl<'a, R: RngCore> Looper<'a, R> {
    pub fn with_rng(buffer: &'a mut [f32], sample_rate: f32, rng: R) -> Self {
        let sample_rate = if sample_rate > 0.0 { sample_rate } else { 48_000.0 };
        Self {
            buffer,
            recorded: 0,
            sample_rate,
            state: LooperState::Init,
            settle_remaining: seconds_to_samples(SETTLE_SECONDS, sample_rate),
            stop_requested: false,
            write_head: Head::new(),
            read_head: Head::new(),
            write_mode: WriteMode::Fixed,
            speed: 1.0,
            feedback: 0.0,
            length_request: None,
            start_control: 0,
            picked_up: false,
            playing: true,
            fade_samples: seconds_to_samples(FADE_SECONDS, sample_rate).max(1),
            seam: Fader::new(),
            ghost: 0.0,
            ghost_step: 0.0,
            jump: Fader::new(),
            pending_jump: None,
            rng,
        }
    }

    // --- Per-sample path ---

    /// Wet sample at the read cursor, with any seam or jump fade applied.
    pub fn read(&mut self) -> f32 {
        if !self.is_looping_state() {
            return 0.0;
        }
        let recorded = &self.buffer[..self.recorded];
        let raw = if self.playing {
            self.read_head.read(recorded)
        } else {
            0.0
        };

        let mut out = raw;
        if self.seam.is_active() {
            let ghost = read_linear(recorded, self.ghost);
            self.seam.process(ghost, raw);
            out = self.seam.output();
            self.ghost += self.ghost_step;
        }

        if self.jump.is_active() {
            self.jump.process(out, 0.0);
            out = self.jump.output();
            if self.jump.crossed_midpoint() {
                if let Some(target) = self.pending_jump.take() {
                    self.read_head.set_index(target);
                    self.seam.cancel();
                    self.playing = true;
                }
            }
        }
        out
    }

    /// Store the next input sample. While buffering `dry` is appended; while
    /// recording the overdub `soft_limit(dry + feedback_source * feedback)`
    /// goes to the write cursor.
    pub fn write(&mut self, dry: f32, feedback_source: f32) {
        match self.state {
            LooperState::Buffering => {
                if self.recorded < self.buffer.len() {
                    self.buffer[self.recorded] = dry;
                    self.recorded += 1;
                }
            }
            LooperState::Recording => {
                let value = soft_limit(dry + feedback_source * self.feedback);
                self.write_head.write(&mut self.buffer[..self.recorded], value);
            }
            LooperState::Init | LooperState::Frozen => {}
        }
    }

    /// Move both cursors one sample and run state transitions.
    pub fn advance(&mut self) {
        match self.state {
            LooperState::Init => {
                if self.settle_remaining == 0 {
                    self.state = LooperState::Buffering;
                } else {
                    self.settle_remaining -= 1;
                }
            }
            LooperState::Buffering => {
                let full = self.recorded >= self.buffer.len();
                if full || (self.stop_requested && self.recorded >= self.min_recording()) {
                    self.finish_buffering();
                }
            }
            LooperState::Recording | LooperState::Frozen => {
                if self.write_mode == WriteMode::Fixed {
                    self.write_head.step_by(1.0);
                }
                if self.playing {
                    self.advance_read();
                }
                if self.write_mode == WriteMode::Follow {
                    self.write_head.set_index(self.read_head.position());
                }
            }
        }
    }

    fn advance_read(&mut self) {
        let previous = self.read_head.position();
        let boundary = self.read_head.update_position(&mut self.rng);
        let step = self.read_head.rate() * self.read_head.direction().sign();
        match boundary {
            Boundary::None | Boundary::Invert => {}
            Boundary::Loop => {
                self.arm_seam(previous + step, step);
                if self.read_head.movement().redraws() {
                    let start = self.read_head.loop_start();
                    let offset = self.rng.gen_range(0..self.read_head.loop_length().max(1));
                    self.jump_to((start + offset) as f64);
                }
            }
            Boundary::Stop => {
                self.playing = false;
                self.arm_seam(previous + step, step);
            }
        }
    }

    /// Crossfade from the continuation past the seam into the wrapped cursor.
    fn arm_seam(&mut self, ghost: f64, step: f64) {
        let length = (self.read_head.loop_length() / 2).clamp(1, self.fade_samples);
        if self.seam.init(FadeKind::Single, length, 1.0) {
            self.ghost = ghost;
            self.ghost_step = step;
        }
    }

    /// Fade out, move the read cursor to `target`, fade back in.
    ///
    /// A jump requested while the previous one is fading back in turns that
    /// fade around from its current level, so the newest target always lands.
    fn jump_to(&mut self, target: f64) {
        self.pending_jump = Some(target);
        if !self.jump.init(FadeKind::OutIn, self.fade_samples, 1.0) {
            self.jump.rewind_to_first_leg();
        }
    }

    /// One sample through `read → write → advance`, feeding back the looper's own output.
    ///
    /// While buffering the input passes straight through.
    pub fn process(&mut self, dry: f32) -> f32 {
        let wet = self.read();
        self.write(dry, wet);
        let buffering = !self.is_looping_state();
        self.advance();
        if buffering {
            dry
        } else {
            wet
        }
    }

    fn finish_buffering(&mut self) {
        self.state = LooperState::Recording;
        self.stop_requested = false;
        self.write_head.reset(self.recorded);
        self.read_head.reset(self.recorded);
        if let Some(length) = self.length_request {
            self.write_head.set_loop_length(length);
            self.read_head.set_loop_length(length);
        }
        self.read_head.set_rate(self.speed as f64);
        self.playing = true;
        self.picked_up = false;
        self.seam.cancel();
        self.jump.cancel();
        self.pending_jump = None;
    }

    fn is_looping_state(&self) -> bool {
        matches!(self.state, LooperState::Recording | LooperState::Frozen)
    }

    // --- Controls ---

    /// Clamp to the speed range of the current write mode.
    pub fn set_speed(&mut self, speed: f32) {
        let min = self.write_mode.min_speed();
        self.speed = if speed.is_finite() { speed.clamp(min, MAX_SPEED) } else { 1.0 };
        self.read_head.set_rate(self.speed as f64);
    }

    pub fn set_mode(&mut self, mode: WriteMode) {
        if mode == self.write_mode {
            return;
        }
        self.write_mode = mode;
        self.set_speed(self.speed);
        if mode == WriteMode::Follow && self.is_looping_state() {
            self.write_head.set_index(self.read_head.position());
        }
    }

    pub fn set_movement(&mut self, movement: Movement) {
        self.read_head.set_movement(movement);
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.read_head.set_direction(direction);
    }

    pub fn toggle_direction(&mut self) {
        self.read_head.toggle_direction();
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.read_head.set_looping(looping);
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = if feedback.is_finite() {
            feedback.clamp(0.0, MAX_FEEDBACK)
        } else {
            0.0
        };
    }

    /// Loop start control, in samples.
    ///
    /// While recording the loop stays anchored at 0 and the value is only
    /// remembered. While frozen it takes over once it comes within the pickup
    /// tolerance of the current loop start.
    pub fn set_loop_start(&mut self, start: usize) {
        self.start_control = start;
        if self.state != LooperState::Frozen {
            return;
        }
        if !self.picked_up {
            let current = self.read_head.loop_start();
            self.picked_up = current.abs_diff(start) <= self.pickup_tolerance();
        }
        if self.picked_up {
            self.write_head.set_loop_start(start);
            self.read_head.set_loop_start(start);
        }
    }

    pub fn set_loop_length(&mut self, length: usize) {
        self.length_request = Some(length);
        if self.is_looping_state() {
            self.write_head.set_loop_length(length);
            self.read_head.set_loop_length(length);
        }
    }

    pub fn set_loop_start_seconds(&mut self, seconds: f32) {
        self.set_loop_start(seconds_to_samples(seconds, self.sample_rate));
    }

    pub fn set_loop_length_seconds(&mut self, seconds: f32) {
        self.set_loop_length(seconds_to_samples(seconds, self.sample_rate));
    }

    fn pickup_tolerance(&self) -> usize {
        let fraction = libm::roundf(self.recorded as f32 * PICKUP_TOLERANCE) as usize;
        fraction.max(MIN_LOOP_LENGTH_SAMPLES)
    }

    /// Recording ⇄ Frozen. Leaving freeze re-anchors the loop start at 0.
    /// Ignored before the buffer is recorded.
    pub fn toggle_freeze(&mut self) {
        match self.state {
            LooperState::Recording => {
                self.state = LooperState::Frozen;
                self.picked_up = false;
            }
            LooperState::Frozen => {
                self.state = LooperState::Recording;
                self.picked_up = false;
                self.write_head.set_loop_start(0);
                self.read_head.set_loop_start(0);
            }
            LooperState::Init | LooperState::Buffering => {}
        }
    }

    /// End buffering. Deferred until at least `MIN_LOOP_LENGTH_SAMPLES` are recorded.
    pub fn stop_buffering(&mut self) {
        match self.state {
            LooperState::Buffering if self.recorded >= self.min_recording() => {
                self.finish_buffering();
            }
            LooperState::Init | LooperState::Buffering => self.stop_requested = true,
            LooperState::Recording | LooperState::Frozen => {}
        }
    }

    fn min_recording(&self) -> usize {
        MIN_LOOP_LENGTH_SAMPLES.min(self.buffer.len()).max(1)
    }

    /// Discard the recording and start buffering again.
    pub fn reset_buffer(&mut self) {
        self.state = LooperState::Buffering;
        self.recorded = 0;
        self.stop_requested = false;
        self.write_head.reset(0);
        self.read_head.reset(0);
        self.seam.cancel();
        self.jump.cancel();
        self.pending_jump = None;
        self.picked_up = false;
        self.playing = true;
    }

    /// Retrigger the read cursor at the loop edge it starts from in its
    /// direction. Also resumes a one-shot loop that has stopped.
    pub fn restart(&mut self) {
        if !self.is_looping_state() {
            return;
        }
        let target = match self.read_head.direction() {
            Direction::Forward => self.read_head.loop_start(),
            Direction::Backward => self.read_head.loop_end(),
        };
        self.jump_to(target as f64);
    }

    /// Copy `leader`'s loop and motion parameters; the read cursor is moved
    /// to the leader's position through a jump fade.
    pub fn follow<R2: RngCore>(&mut self, leader: &Looper<'_, R2>) {
        self.write_mode = leader.write_mode;
        self.set_speed(leader.speed);
        self.set_feedback(leader.feedback);
        self.set_movement(leader.movement());
        self.set_direction(leader.direction());
        self.set_looping(leader.is_looping());
        self.length_request = leader.length_request;
        if self.is_looping_state() && leader.is_looping_state() {
            let length = leader.loop_length();
            let start = leader.loop_start();
            for head in [&mut self.write_head, &mut self.read_head] {
                head.set_loop_length(length);
                head.set_loop_start(start);
            }
            self.jump_to(leader.read_position());
        }
    }

    // --- Telemetry ---

    pub fn state(&self) -> LooperState {
        self.state
    }

    pub fn is_frozen(&self) -> bool {
        self.state == LooperState::Frozen
    }

    pub fn is_buffering(&self) -> bool {
        matches!(self.state, LooperState::Init | LooperState::Buffering)
    }

    /// False once a one-shot loop has reached its edge.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn recorded_samples(&self) -> usize {
        self.recorded
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn loop_start(&self) -> usize {
        self.read_head.loop_start()
    }

    pub fn loop_length(&self) -> usize {
        self.read_head.loop_length()
    }

    pub fn loop_end(&self) -> usize {
        self.read_head.loop_end()
    }

    pub fn topology(&self) -> Topology {
        self.read_head.topology()
    }

    pub fn read_position(&self) -> f64 {
        self.read_head.position()
    }

    pub fn write_position(&self) -> f64 {
        match self.state {
            LooperState::Init | LooperState::Buffering => self.recorded as f64,
            LooperState::Recording | LooperState::Frozen => self.write_head.position(),
        }
    }

    pub fn start_control(&self) -> usize {
        self.start_control
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn movement(&self) -> Movement {
        self.read_head.movement()
    }

    pub fn direction(&self) -> Direction {
        self.read_head.direction()
    }

    pub fn is_looping(&self) -> bool {
        self.read_head.is_looping()
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    pub fn recorded_seconds(&self) -> f32 {
        samples_to_seconds(self.recorded as f64, self.sample_rate)
    }

    pub fn loop_start_seconds(&self) -> f32 {
        samples_to_seconds(self.loop_start() as f64, self.sample_rate)
    }

    pub fn loop_length_seconds(&self) -> f32 {
        samples_to_seconds(self.loop_length() as f64, self.sample_rate)
    }

    pub fn loop_end_seconds(&self) -> f32 {
        samples_to_seconds(self.loop_end() as f64, self.sample_rate)
    }

    pub fn read_position_seconds(&self) -> f32 {
        samples_to_seconds(self.read_position(), self.sample_rate)
    }

    /// Recorded samples, for inspection.
    pub fn recording(&self) -> &[f32] {
        &self.buffer[..self.recorded]
    }
}
