//! Headless controller for the mimeo looper.
//!
//! Owns the live session (an audio thread running a [`StereoLooper`] between
//! cpal input and output), the control and telemetry channels to it, settings
//! slots and offline rendering. Both the CLI and tests drive the looper
//! through this crate.

mod action;
mod controls;
mod error;
mod render;
mod settings;
mod telemetry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use mimeo_audio::{AudioInput, AudioOutput, CpalInput, CpalOutput};
use mimeo_engine::{BlockProcessor, StereoLooper, BLOCK_SIZE};

pub use action::{parse_script, Action, Cue};
pub use controls::{ControlSnapshot, SharedControls};
pub use error::MasterError;
pub use mimeo_engine::{Direction, Frame, LinkMode, LooperState, Movement, WriteMode};
pub use mimeo_formats::{decode_wav, frames_to_wav, load_wav, save_wav, FormatError, WavAudio};
pub use render::{render, RenderOptions};
pub use settings::{Settings, SettingsStore, MAX_BUFFER_SECONDS, MIN_BUFFER_SECONDS, SLOT_COUNT};
pub use telemetry::{Telemetry, TelemetrySnapshot};

/// Spins waiting for one captured frame before substituting silence.
const INPUT_SPIN_LIMIT: u32 = 10_000;

/// Headless looper controller.
pub struct Controller {
    settings: Settings,
    controls: Arc<SharedControls>,
    telemetry: Arc<Telemetry>,
    session: Option<SessionHandle>,
}

struct SessionHandle {
    stop_signal: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), MasterError>>>,
}

impl Controller {
    pub fn new(settings: Settings) -> Self {
        Self {
            controls: Arc::new(SharedControls::new(&settings)),
            telemetry: Arc::new(Telemetry::new()),
            settings,
            session: None,
        }
    }

    /// Settings the controller was created with, updated with the live controls.
    pub fn settings(&self) -> Settings {
        self.controls.to_settings(&self.settings)
    }

    pub fn controls(&self) -> &SharedControls {
        &self.controls
    }

    pub fn send(&self, action: Action) {
        action.send(&self.controls);
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    // --- Live session ---

    /// Start the audio thread. Device errors surface from [`Controller::stop`].
    pub fn start(&mut self) -> Result<(), MasterError> {
        if self.is_running() {
            return Err(MasterError::AlreadyRunning);
        }
        if let Err(e) = self.stop() {
            tracing::warn!(error = %e, "previous session");
        }

        let stop_signal = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let session = Session {
            settings: self.settings(),
            controls: self.controls.clone(),
            telemetry: self.telemetry.clone(),
            stop: stop_signal.clone(),
        };
        let done = finished.clone();

        let thread = std::thread::Builder::new()
            .name("mimeo-audio".into())
            .spawn(move || {
                let result = session.run();
                if let Err(ref e) = result {
                    tracing::error!(error = %e, "session ended with error");
                }
                done.store(true, Ordering::Release);
                result
            })?;

        self.session = Some(SessionHandle {
            stop_signal,
            finished,
            thread: Some(thread),
        });
        tracing::info!("session started");
        Ok(())
    }

    /// Stop the audio thread and report how it ended.
    pub fn stop(&mut self) -> Result<(), MasterError> {
        let Some(mut handle) = self.session.take() else {
            return Ok(());
        };
        handle.stop_signal.store(true, Ordering::Release);
        let result = match handle.thread.take() {
            Some(thread) => thread.join().map_err(|_| MasterError::SessionPanicked)?,
            None => Ok(()),
        };
        tracing::info!("session stopped");
        result
    }

    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.finished.load(Ordering::Acquire))
    }

    // --- Offline rendering ---

    /// Render `input` with this controller's settings and `cues`.
    pub fn render(&self, input: &WavAudio, cues: Vec<Cue>, tail_seconds: f32) -> Vec<Frame> {
        let options = RenderOptions {
            settings: self.settings(),
            cues,
            tail_seconds,
        };
        render(&input.frames, input.sample_rate, &options)
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Everything the audio thread owns.
struct Session {
    settings: Settings,
    controls: Arc<SharedControls>,
    telemetry: Arc<Telemetry>,
    stop: Arc<AtomicBool>,
}

impl Session {
    fn run(self) -> Result<(), MasterError> {
        let (mut output, consumer) = CpalOutput::new()?;
        let sample_rate = output.sample_rate();

        let mut input = match CpalInput::new(sample_rate) {
            Ok((mut input, producer)) => {
                input.build_stream(producer)?;
                input.start()?;
                Some(input)
            }
            Err(e) => {
                tracing::warn!(error = %e, "no capture device, running on silence");
                None
            }
        };

        output.build_stream(consumer)?;
        output.start()?;

        let capacity = self.settings.buffer_samples(sample_rate);
        let mut left = vec![0.0f32; capacity];
        let mut right = vec![0.0f32; capacity];
        let mut looper = StereoLooper::new(&mut left, &mut right, sample_rate as f32);
        self.settings.apply(&mut looper);
        tracing::info!(sample_rate, capacity, "looper ready");

        let mut block_in = [Frame::silence(); BLOCK_SIZE];
        let mut block_out = [Frame::silence(); BLOCK_SIZE];
        let mut revision = self.controls.revision();

        while !self.stop.load(Ordering::Acquire) {
            let current = self.controls.revision();
            if current != revision {
                self.controls.snapshot().apply(&mut looper);
                revision = current;
            }
            looper.request(self.controls.take_requests());

            match input.as_mut() {
                Some(input) => self.capture(input, &mut block_in),
                None => block_in.fill(Frame::silence()),
            }
            looper.process_block(&block_in, &mut block_out);
            for frame in block_out {
                output.write_spin(frame);
            }
            self.telemetry.publish(&looper);
        }

        output.stop()?;
        if let Some(mut input) = input {
            input.stop()?;
        }
        Ok(())
    }

    /// Fill `block` from the capture ring, waiting briefly for late frames.
    fn capture(&self, input: &mut CpalInput, block: &mut [Frame]) {
        if input.take_overflow() {
            tracing::warn!("capture ring overflowed");
        }
        for frame in block.iter_mut() {
            let mut spins = 0;
            *frame = loop {
                if let Some(f) = input.try_read() {
                    break f;
                }
                spins += 1;
                if spins >= INPUT_SPIN_LIMIT || self.stop.load(Ordering::Relaxed) {
                    self.telemetry.record_underrun();
                    break Frame::silence();
                }
                std::hint::spin_loop();
            };
        }
    }
}
