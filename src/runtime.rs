//! Top-level facade that ties the sound service, mixer graph, and audio
//! output device together behind one handle.

use crate::Result;

#[cfg(feature = "soundio")]
use nvgt_soundio::SoundService;

#[cfg(feature = "mixer")]
use nvgt_mixer::{output_mixer, AudioOutput, Mixer, OutputConfig, SoundSource};

#[cfg(feature = "mixer")]
use std::sync::Arc;

/// Owns the process-wide sound service and, when the `mixer` feature is
/// enabled, the audio output device. Subsystems below this (packs, sound
/// sources, spatial DSP) are reached through the re-exports at the crate
/// root; `NvgtRuntime` only wires their process-wide singletons together.
///
/// # Example
///
/// ```ignore
/// use nvgt_core::prelude::*;
///
/// let runtime = NvgtRuntime::builder().build()?;
/// runtime.start_output()?;
/// let source = runtime.load_sound("music.ogg")?;
/// source.play();
/// ```
pub struct NvgtRuntime {
    #[cfg(feature = "soundio")]
    sound_service: SoundService,

    #[cfg(feature = "mixer")]
    output: AudioOutput,
}

impl NvgtRuntime {
    pub fn builder() -> NvgtRuntimeBuilder {
        NvgtRuntimeBuilder::default()
    }

    #[cfg(feature = "soundio")]
    pub fn sound_service(&self) -> &SoundService {
        &self.sound_service
    }

    #[cfg(feature = "mixer")]
    pub fn root_mixer(&self) -> Arc<Mixer> {
        output_mixer()
    }

    #[cfg(feature = "mixer")]
    pub fn start_output(&mut self) -> Result<()> {
        self.output.start()?;
        Ok(())
    }

    #[cfg(feature = "mixer")]
    pub fn stop_output(&mut self) {
        self.output.stop();
    }

    #[cfg(feature = "mixer")]
    pub fn sample_rate(&self) -> u32 {
        self.output.sample_rate()
    }

    /// Loads and decodes a sound source from a filesystem path, ready to be
    /// attached to a mixer and played.
    #[cfg(feature = "mixer")]
    pub fn load_sound(&self, path: &str) -> Result<Arc<SoundSource>> {
        Ok(SoundSource::load_file(path)?)
    }
}

/// Builder for [`NvgtRuntime`]. Subsystems compile in or out based on Cargo
/// features; the only runtime choice exposed so far is which output device
/// to open.
pub struct NvgtRuntimeBuilder {
    #[cfg(feature = "mixer")]
    output_device: Option<usize>,
}

impl Default for NvgtRuntimeBuilder {
    fn default() -> Self {
        Self {
            #[cfg(feature = "mixer")]
            output_device: None,
        }
    }
}

impl NvgtRuntimeBuilder {
    #[cfg(feature = "mixer")]
    pub fn output_device(mut self, index: usize) -> Self {
        self.output_device = Some(index);
        self
    }

    pub fn build(self) -> Result<NvgtRuntime> {
        Ok(NvgtRuntime {
            #[cfg(feature = "soundio")]
            sound_service: SoundService::new(),

            #[cfg(feature = "mixer")]
            output: AudioOutput::new(OutputConfig { device_index: self.output_device })?,
        })
    }
}
