//! Control handoff from the control thread to the audio thread.
//!
//! Every scalar has one writer (the controller) and one reader (the audio
//! thread). Setters bump a revision counter so the audio thread only
//! re-applies the scalar set after something changed. Transition requests
//! are one-shot flags taken with `swap(false)` at the start of a block.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use atomic_float::AtomicF32;
use mimeo_engine::{Channel, Direction, LinkMode, Movement, Requests, StereoLooper, WriteMode};

use crate::settings::Settings;

/// Scalar controls as seen by the audio thread at one revision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlSnapshot {
    pub speed: f32,
    pub movement: Movement,
    pub link: LinkMode,
    pub write_mode: WriteMode,
    pub gain: f32,
    pub mix: f32,
    pub feedback: f32,
    pub filter_hz: f32,
    pub loop_start_seconds: f32,
    /// Negative means "whole recording".
    pub loop_length_seconds: f32,
    pub looping: bool,
}

impl ControlSnapshot {
    pub fn apply(&self, looper: &mut StereoLooper<'_>) {
        looper.set_link_mode(self.link);
        looper.set_write_mode(Channel::Both, self.write_mode);
        looper.set_speed(Channel::Both, self.speed);
        looper.set_movement(Channel::Both, self.movement);
        looper.set_looping(Channel::Both, self.looping);
        looper.set_gain(self.gain);
        looper.set_mix(self.mix);
        looper.set_feedback(self.feedback);
        looper.set_filter(self.filter_hz);
        looper.set_loop_start_seconds(Channel::Both, self.loop_start_seconds);
        if self.loop_length_seconds >= 0.0 {
            looper.set_loop_length_seconds(Channel::Both, self.loop_length_seconds);
        } else {
            looper.set_loop_length(Channel::Both, usize::MAX);
        }
    }
}

#[derive(Debug)]
pub struct SharedControls {
    revision: AtomicU64,
    speed: AtomicF32,
    movement: AtomicU8,
    link: AtomicU8,
    write_mode: AtomicU8,
    gain: AtomicF32,
    mix: AtomicF32,
    feedback: AtomicF32,
    filter_hz: AtomicF32,
    loop_start_seconds: AtomicF32,
    loop_length_seconds: AtomicF32,
    looping: AtomicBool,
    /// Direction after every toggle requested so far; only read back for saving.
    direction: AtomicU8,

    toggle_freeze: AtomicBool,
    stop_buffering: AtomicBool,
    reset_buffer: AtomicBool,
    restart: AtomicBool,
    toggle_direction: AtomicBool,
}

impl SharedControls {
    pub fn new(settings: &Settings) -> Self {
        Self {
            revision: AtomicU64::new(1),
            speed: AtomicF32::new(settings.speed),
            movement: AtomicU8::new(movement_index(settings.movement)),
            link: AtomicU8::new(link_index(settings.link)),
            write_mode: AtomicU8::new(write_mode_index(settings.write_mode)),
            gain: AtomicF32::new(settings.gain),
            mix: AtomicF32::new(settings.mix),
            feedback: AtomicF32::new(settings.feedback),
            filter_hz: AtomicF32::new(settings.filter_hz),
            loop_start_seconds: AtomicF32::new(0.0),
            loop_length_seconds: AtomicF32::new(settings.loop_length_seconds.unwrap_or(-1.0)),
            looping: AtomicBool::new(settings.looping),
            direction: AtomicU8::new(direction_index(settings.direction)),
            toggle_freeze: AtomicBool::new(false),
            stop_buffering: AtomicBool::new(false),
            reset_buffer: AtomicBool::new(false),
            restart: AtomicBool::new(false),
            toggle_direction: AtomicBool::new(false),
        }
    }

    fn bump(&self) {
        self.revision.fetch_add(1, Ordering::Release);
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    // --- Scalars ---

    pub fn set_speed(&self, speed: f32) {
        self.speed.store(speed, Ordering::Relaxed);
        self.bump();
    }

    pub fn set_movement(&self, movement: Movement) {
        self.movement.store(movement_index(movement), Ordering::Relaxed);
        self.bump();
    }

    pub fn set_link(&self, link: LinkMode) {
        self.link.store(link_index(link), Ordering::Relaxed);
        self.bump();
    }

    pub fn set_write_mode(&self, mode: WriteMode) {
        self.write_mode.store(write_mode_index(mode), Ordering::Relaxed);
        self.bump();
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.store(gain, Ordering::Relaxed);
        self.bump();
    }

    pub fn set_mix(&self, mix: f32) {
        self.mix.store(mix, Ordering::Relaxed);
        self.bump();
    }

    pub fn set_feedback(&self, feedback: f32) {
        self.feedback.store(feedback, Ordering::Relaxed);
        self.bump();
    }

    pub fn set_filter(&self, hz: f32) {
        self.filter_hz.store(hz, Ordering::Relaxed);
        self.bump();
    }

    pub fn set_loop_start_seconds(&self, seconds: f32) {
        self.loop_start_seconds.store(seconds, Ordering::Relaxed);
        self.bump();
    }

    pub fn set_loop_length_seconds(&self, seconds: Option<f32>) {
        let value = seconds.map_or(-1.0, |s| s.max(0.0));
        self.loop_length_seconds.store(value, Ordering::Relaxed);
        self.bump();
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
        self.bump();
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            speed: self.speed.load(Ordering::Relaxed),
            movement: Movement::ALL
                .get(self.movement.load(Ordering::Relaxed) as usize)
                .copied()
                .unwrap_or_default(),
            link: LinkMode::ALL
                .get(self.link.load(Ordering::Relaxed) as usize)
                .copied()
                .unwrap_or_default(),
            write_mode: match self.write_mode.load(Ordering::Relaxed) {
                1 => WriteMode::Follow,
                _ => WriteMode::Fixed,
            },
            gain: self.gain.load(Ordering::Relaxed),
            mix: self.mix.load(Ordering::Relaxed),
            feedback: self.feedback.load(Ordering::Relaxed),
            filter_hz: self.filter_hz.load(Ordering::Relaxed),
            loop_start_seconds: self.loop_start_seconds.load(Ordering::Relaxed),
            loop_length_seconds: self.loop_length_seconds.load(Ordering::Relaxed),
            looping: self.looping.load(Ordering::Relaxed),
        }
    }

    /// The persisted fields of `base` updated with the current controls.
    pub fn to_settings(&self, base: &Settings) -> Settings {
        let s = self.snapshot();
        Settings {
            speed: s.speed,
            movement: s.movement,
            link: s.link,
            write_mode: s.write_mode,
            gain: s.gain,
            mix: s.mix,
            feedback: s.feedback,
            filter_hz: s.filter_hz,
            loop_length_seconds: (s.loop_length_seconds >= 0.0).then_some(s.loop_length_seconds),
            looping: s.looping,
            direction: self.direction(),
            ..base.clone()
        }
    }

    // --- Requests ---

    pub fn request_toggle_freeze(&self) {
        // Two toggles before the next block cancel out.
        self.toggle_freeze.fetch_xor(true, Ordering::AcqRel);
    }

    pub fn request_stop_buffering(&self) {
        self.stop_buffering.store(true, Ordering::Release);
    }

    pub fn request_reset_buffer(&self) {
        self.reset_buffer.store(true, Ordering::Release);
    }

    pub fn request_restart(&self) {
        self.restart.store(true, Ordering::Release);
    }

    pub fn request_toggle_direction(&self) {
        self.toggle_direction.fetch_xor(true, Ordering::AcqRel);
        self.direction.fetch_xor(1, Ordering::Relaxed);
    }

    pub fn direction(&self) -> Direction {
        match self.direction.load(Ordering::Relaxed) {
            1 => Direction::Backward,
            _ => Direction::Forward,
        }
    }

    /// Take every pending request, clearing the flags.
    pub fn take_requests(&self) -> Requests {
        Requests {
            toggle_freeze: self.toggle_freeze.swap(false, Ordering::AcqRel),
            stop_buffering: self.stop_buffering.swap(false, Ordering::AcqRel),
            reset_buffer: self.reset_buffer.swap(false, Ordering::AcqRel),
            restart: self.restart.swap(false, Ordering::AcqRel),
            toggle_direction: self.toggle_direction.swap(false, Ordering::AcqRel),
        }
    }
}

impl Default for SharedControls {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

fn movement_index(movement: Movement) -> u8 {
    Movement::ALL.iter().position(|&m| m == movement).unwrap_or(0) as u8
}

fn link_index(link: LinkMode) -> u8 {
    LinkMode::ALL.iter().position(|&m| m == link).unwrap_or(0) as u8
}

fn direction_index(direction: Direction) -> u8 {
    match direction {
        Direction::Forward => 0,
        Direction::Backward => 1,
    }
}

fn write_mode_index(mode: WriteMode) -> u8 {
    match mode {
        WriteMode::Fixed => 0,
        WriteMode::Follow => 1,
    }
}
