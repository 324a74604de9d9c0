//! The real-time mixer graph: a tree of [`Mixer`] nodes carrying volume/pan/
//! pitch and an effects chain, with [`SoundSource`] leaves that decode or
//! stream audio into it. A process-wide root ([`output_mixer`]) feeds the
//! `cpal` output device via [`AudioOutput`].

mod decode;
mod error;
mod fx;
mod mixer;
mod output;
mod preload;
mod slide;
mod source;

pub use decode::{decode_all, decode_bytes, DecodedAudio};
pub use error::{MixerError, Result};
pub use fx::{Effect, EffectChain, EffectSlot};
pub use mixer::{output_mixer, Mixer, NOMINAL_SAMPLE_RATE};
pub use output::{AudioOutput, OutputConfig};
pub use preload::{PreloadCache, PreloadConfig};
pub use source::{legacy_xor_transform, EnvironmentBinding, SoundSource, SourceCallback};
