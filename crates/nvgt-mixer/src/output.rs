//! The process-wide output device: a `cpal` stream whose callback mixes every
//! source attached (directly or through nested mixers) under the root
//! [`crate::mixer::output_mixer`].

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::error::{MixerError, Result};
use crate::mixer::{output_mixer, Mixer};

/// `cpal::Stream` is `!Send`; this engine is only ever touched from behind a
/// `Mutex`, and the stream never moves threads after `start` creates it on the
/// calling thread.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);
unsafe impl Send for StreamHandle {}

#[derive(Clone, Default)]
pub struct OutputConfig {
    pub device_index: Option<usize>,
}

pub struct AudioOutput {
    sample_rate: u32,
    channels: usize,
    device_index: Option<usize>,
    stream: Option<StreamHandle>,
}

impl AudioOutput {
    pub fn new(config: OutputConfig) -> Result<Self> {
        let device = Self::device(config.device_index)?;
        let output_config = device.default_output_config().map_err(|_| MixerError::NoOutputDevice)?;
        Ok(Self {
            sample_rate: output_config.sample_rate().0,
            channels: output_config.channels() as usize,
            device_index: config.device_index,
            stream: None,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let device = Self::device(self.device_index)?;
        let output_config = device.default_output_config().map_err(|_| MixerError::NoOutputDevice)?;
        let config: cpal::StreamConfig = output_config.clone().into();
        let root = output_mixer();

        let stream = match output_config.sample_format() {
            cpal::SampleFormat::F32 => Self::build::<f32>(&device, &config, root)?,
            cpal::SampleFormat::I16 => Self::build::<i16>(&device, &config, root)?,
            cpal::SampleFormat::U16 => Self::build::<u16>(&device, &config, root)?,
            other => {
                tracing::warn!(?other, "unsupported sample format, falling back to f32");
                Self::build::<f32>(&device, &config, root)?
            }
        };
        stream.play()?;
        self.stream = Some(StreamHandle(stream));
        Ok(())
    }

    pub fn stop(&mut self) {
        self.stream = None;
    }

    fn device(index: Option<usize>) -> Result<cpal::Device> {
        let host = cpal::default_host();
        if let Some(idx) = index {
            let devices: Vec<_> = host.output_devices()?.collect();
            devices.into_iter().nth(idx).ok_or(MixerError::NoOutputDevice)
        } else {
            host.default_output_device().ok_or(MixerError::NoOutputDevice)
        }
    }

    fn build<T>(device: &cpal::Device, config: &cpal::StreamConfig, root: Arc<Mixer>) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let channels = config.channels as usize;
        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    let frames = data.len() / channels.max(1);
                    let mut mixed = vec![0.0f32; frames * 2];
                    mix_tree(&root, &mut mixed);
                    for (i, sample) in data.iter_mut().enumerate() {
                        let channel = i % channels;
                        let frame = i / channels;
                        let value = if channel < 2 {
                            mixed.get(frame * 2 + channel).copied().unwrap_or(0.0)
                        } else {
                            0.0
                        };
                        *sample = T::from_sample(value);
                    }
                }));
                if result.is_err() {
                    for sample in data.iter_mut() {
                        *sample = T::from_sample(0.0);
                    }
                }
            },
            |err| tracing::error!(%err, "output stream error"),
            None,
        )?;
        Ok(stream)
    }
}

/// Recursively mixes `mixer`'s sources and child mixers into `out` (stereo,
/// interleaved), applying `mixer`'s own volume/pan on the way back up.
fn mix_tree(mixer: &Arc<Mixer>, out: &mut [f32]) {
    for source in mixer.child_sources() {
        source.fill_buffer(out, 2);
    }
    for child in mixer.child_mixers() {
        let mut nested = vec![0.0f32; out.len()];
        mix_tree(&child, &mut nested);
        let volume = child.volume();
        let pan = child.pan();
        let left_gain = volume * (1.0 - pan.max(0.0));
        let right_gain = volume * (1.0 + pan.min(0.0));
        for (i, sample) in nested.iter().enumerate() {
            let gain = if i % 2 == 0 { left_gain } else { right_gain };
            out[i] += sample * gain;
        }
    }
}
