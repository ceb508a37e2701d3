//! Engine state published by the audio thread for display.
//!
//! Single writer (audio thread, once per block), any number of readers.
//! Fields are independent atomics; a reader may see values from two
//! neighbouring blocks, which is fine for display.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use atomic_float::{AtomicF32, AtomicF64};
use mimeo_engine::{LinkMode, LooperState, Movement, StereoLooper, Topology};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TelemetrySnapshot {
    pub state: LooperState,
    pub sample_rate: f32,
    pub recorded_samples: u64,
    pub loop_start: u64,
    pub loop_length: u64,
    pub loop_end: u64,
    pub read_position: f64,
    pub inverted: bool,
    pub playing: bool,
    pub movement: Movement,
    pub link: LinkMode,
    pub speed: f32,
    pub input_underruns: u32,
}

impl TelemetrySnapshot {
    fn seconds(&self, samples: f64) -> f64 {
        if self.sample_rate > 0.0 {
            samples / self.sample_rate as f64
        } else {
            0.0
        }
    }

    pub fn recorded_seconds(&self) -> f64 {
        self.seconds(self.recorded_samples as f64)
    }

    pub fn loop_start_seconds(&self) -> f64 {
        self.seconds(self.loop_start as f64)
    }

    pub fn loop_length_seconds(&self) -> f64 {
        self.seconds(self.loop_length as f64)
    }

    pub fn read_position_seconds(&self) -> f64 {
        self.seconds(self.read_position)
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            LooperState::Init => "init",
            LooperState::Buffering => "buffering",
            LooperState::Recording => "recording",
            LooperState::Frozen => "frozen",
        };
        write!(
            f,
            "{:<9} | rec {:6.2}s | loop {:6.2}s +{:6.2}s{} | pos {:6.2}s | {} x{:.3} | {}",
            state,
            self.recorded_seconds(),
            self.loop_start_seconds(),
            self.loop_length_seconds(),
            if self.inverted { " (wrapped)" } else { "" },
            self.read_position_seconds(),
            self.movement.name(),
            self.speed,
            self.link.name(),
        )?;
        if !self.playing {
            write!(f, " | stopped")?;
        }
        if self.input_underruns > 0 {
            write!(f, " | {} underruns", self.input_underruns)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Telemetry {
    state: AtomicU8,
    sample_rate: AtomicF32,
    recorded_samples: AtomicU64,
    loop_start: AtomicU64,
    loop_length: AtomicU64,
    loop_end: AtomicU64,
    read_position: AtomicF64,
    inverted: AtomicBool,
    playing: AtomicBool,
    movement: AtomicU8,
    link: AtomicU8,
    speed: AtomicF32,
    input_underruns: AtomicU32,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the left channel's view of `looper`.
    pub fn publish(&self, looper: &StereoLooper<'_>) {
        let l = looper.left();
        self.state.store(state_index(l.state()), Ordering::Relaxed);
        self.sample_rate.store(l.sample_rate(), Ordering::Relaxed);
        self.recorded_samples.store(l.recorded_samples() as u64, Ordering::Relaxed);
        self.loop_start.store(l.loop_start() as u64, Ordering::Relaxed);
        self.loop_length.store(l.loop_length() as u64, Ordering::Relaxed);
        self.loop_end.store(l.loop_end() as u64, Ordering::Relaxed);
        self.read_position.store(l.read_position(), Ordering::Relaxed);
        self.inverted.store(l.topology() == Topology::Inverted, Ordering::Relaxed);
        self.playing.store(l.is_playing(), Ordering::Relaxed);
        self.movement.store(
            Movement::ALL.iter().position(|&m| m == l.movement()).unwrap_or(0) as u8,
            Ordering::Relaxed,
        );
        self.link.store(
            LinkMode::ALL.iter().position(|&m| m == looper.link_mode()).unwrap_or(0) as u8,
            Ordering::Relaxed,
        );
        self.speed.store(l.speed(), Ordering::Relaxed);
    }

    pub fn record_underrun(&self) {
        self.input_underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            state: match self.state.load(Ordering::Relaxed) {
                1 => LooperState::Buffering,
                2 => LooperState::Recording,
                3 => LooperState::Frozen,
                _ => LooperState::Init,
            },
            sample_rate: self.sample_rate.load(Ordering::Relaxed),
            recorded_samples: self.recorded_samples.load(Ordering::Relaxed),
            loop_start: self.loop_start.load(Ordering::Relaxed),
            loop_length: self.loop_length.load(Ordering::Relaxed),
            loop_end: self.loop_end.load(Ordering::Relaxed),
            read_position: self.read_position.load(Ordering::Relaxed),
            inverted: self.inverted.load(Ordering::Relaxed),
            playing: self.playing.load(Ordering::Relaxed),
            movement: Movement::ALL
                .get(self.movement.load(Ordering::Relaxed) as usize)
                .copied()
                .unwrap_or_default(),
            link: LinkMode::ALL
                .get(self.link.load(Ordering::Relaxed) as usize)
                .copied()
                .unwrap_or_default(),
            speed: self.speed.load(Ordering::Relaxed),
            input_underruns: self.input_underruns.load(Ordering::Relaxed),
        }
    }
}

fn state_index(state: LooperState) -> u8 {
    match state {
        LooperState::Init => 0,
        LooperState::Buffering => 1,
        LooperState::Recording => 2,
        LooperState::Frozen => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimeo_engine::{Channel, Frame};

    #[test]
    fn publishes_looper_state() {
        let (mut l, mut r) = (vec![0.0; 4800], vec![0.0; 4800]);
        let mut looper = StereoLooper::new(&mut l, &mut r, 48_000.0);
        for _ in 0..1000 {
            looper.process(Frame::silence());
        }
        looper.stop_buffering();
        looper.set_movement(Channel::Both, Movement::Pendulum);
        looper.process(Frame::silence());

        let t = Telemetry::new();
        t.publish(&looper);
        let s = t.snapshot();
        assert_eq!(s.state, LooperState::Recording);
        assert_eq!(s.recorded_samples, looper.left().recorded_samples() as u64);
        assert_eq!(s.movement, Movement::Pendulum);
        assert_eq!(s.read_position, 1.0);
        assert!(s.playing);
        assert!(s.to_string().starts_with("recording"));
    }

    #[test]
    fn default_snapshot_is_init() {
        let s = Telemetry::new().snapshot();
        assert_eq!(s.state, LooperState::Init);
        assert_eq!(s.recorded_seconds(), 0.0);
    }

    #[test]
    fn underruns_show_in_display() {
        let t = Telemetry::new();
        t.record_underrun();
        assert!(t.snapshot().to_string().contains("1 underruns"));
    }
}
