//! CPAL-based duplex backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use mimeo_dsp::Frame;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::traits::{deinterleave, interleave, AudioError, AudioInput, AudioOutput};

/// Ring capacity: about 100 ms of frames.
fn ring_capacity(sample_rate: u32) -> usize {
    (sample_rate as usize / 10).max(256)
}

/// CPAL output stream draining a frame ring.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<Frame>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default output device. The returned consumer is handed to
    /// [`CpalOutput::build_stream`].
    pub fn new() -> Result<(Self, HeapCons<Frame>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice("output"))?;
        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        let config: StreamConfig = config.into();

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "opened output device"
        );

        let rb = HeapRb::<Frame>::new(ring_capacity(config.sample_rate.0));
        let (producer, consumer) = rb.split();

        Ok((
            Self {
                device,
                config,
                stream: None,
                producer,
                running: Arc::new(AtomicBool::new(false)),
            },
            consumer,
        ))
    }

    pub fn build_stream(&mut self, mut consumer: HeapCons<Frame>) -> Result<(), AudioError> {
        let running = self.running.clone();
        let channels = self.config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }
                    for chunk in data.chunks_mut(channels) {
                        let frame = consumer.try_pop().unwrap_or_default();
                        interleave(frame, chunk);
                    }
                },
                |err| tracing::error!(%err, "output stream error"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }

    /// Queue one frame, spinning until the ring has room. Paces the engine thread.
    pub fn write_spin(&mut self, frame: Frame) {
        while self.producer.try_push(frame).is_err() {
            std::hint::spin_loop();
        }
    }

    /// Frames queued but not yet played.
    pub fn queued(&self) -> usize {
        self.producer.occupied_len()
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn write(&mut self, frames: &[Frame]) -> usize {
        self.producer.push_slice(frames)
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}

/// CPAL input stream filling a frame ring.
pub struct CpalInput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    consumer: HeapCons<Frame>,
    dropped: Arc<AtomicBool>,
}

impl CpalInput {
    /// Open the default input device, asking for `sample_rate` so capture and
    /// playback run on one clock. The returned producer is handed to
    /// [`CpalInput::build_stream`].
    pub fn new(sample_rate: u32) -> Result<(Self, HeapProd<Frame>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(AudioError::NoDevice("input"))?;
        let default = device
            .default_input_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
        let mut config: StreamConfig = default.into();
        config.sample_rate = SampleRate(sample_rate);

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels = config.channels,
            "opened input device"
        );

        let rb = HeapRb::<Frame>::new(ring_capacity(sample_rate));
        let (producer, consumer) = rb.split();

        Ok((
            Self {
                device,
                config,
                stream: None,
                consumer,
                dropped: Arc::new(AtomicBool::new(false)),
            },
            producer,
        ))
    }

    pub fn build_stream(&mut self, mut producer: HeapProd<Frame>) -> Result<(), AudioError> {
        let channels = self.config.channels as usize;
        let dropped = self.dropped.clone();

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for chunk in data.chunks(channels) {
                        if producer.try_push(deinterleave(chunk)).is_err() {
                            dropped.store(true, Ordering::Relaxed);
                        }
                    }
                },
                |err| tracing::error!(%err, "input stream error"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }

    pub fn try_read(&mut self) -> Option<Frame> {
        self.consumer.try_pop()
    }

    /// True once if the capture ring overflowed since the last call.
    pub fn take_overflow(&self) -> bool {
        self.dropped.swap(false, Ordering::Relaxed)
    }
}

impl AudioInput for CpalInput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn read(&mut self, frames: &mut [Frame]) -> usize {
        self.consumer.pop_slice(frames)
    }

    fn start(&mut self) -> Result<(), AudioError> {
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}
