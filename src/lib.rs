//! # nvgt-core
//!
//! The three "hard core" subsystems of a text-to-speech-scriptable game
//! engine, reassembled as independent, feature-gated Rust crates:
//!
//! - **nvgt-pack** - indexed, optionally-encrypted, content-addressable
//!   container format
//! - **nvgt-soundio** - sound service: protocol/filter registry resolving
//!   named resources (filesystem, memory, pack, HTTP) into input streams
//! - **nvgt-mixer** - the real-time mixer graph and sound sources
//! - **nvgt-spatial** - basic positioning, HRTF-style binaural rendering,
//!   and the sound-environment reflections simulator
//! - **nvgt-payload** - the compiled-application payload format: embedded
//!   packs plus encrypted, compressed bytecode appended to a platform stub
//!
//! ## Quick start
//!
//! ```ignore
//! use nvgt_core::prelude::*;
//!
//! let runtime = NvgtRuntime::builder().build()?;
//! let source = runtime.sound_service().open_triplet("music.ogg")?;
//! ```
//!
//! ## Feature flags
//!
//! - `default` - pack, soundio, mixer, spatial, payload (every subsystem
//!   except the HTTP sound-service protocol)
//! - `full` - default plus `http`
//! - `http` - enables the `nvgt-soundio` HTTP protocol, which pulls in a TLS
//!   stack via `reqwest`

#[cfg(feature = "pack")]
pub use nvgt_pack as pack;

#[cfg(feature = "pack")]
pub use nvgt_pack::{Pack, HEADER_LEN, MAGIC};

#[cfg(feature = "soundio")]
pub use nvgt_soundio as soundio;

#[cfg(feature = "soundio")]
pub use nvgt_soundio::{triplet_key, Directive, Filter, Protocol, SoundService};

#[cfg(feature = "mixer")]
pub use nvgt_mixer as mixer;

#[cfg(feature = "mixer")]
pub use nvgt_mixer::{output_mixer, AudioOutput, Mixer, SoundSource, NOMINAL_SAMPLE_RATE};

#[cfg(feature = "spatial")]
pub use nvgt_spatial as spatial;

#[cfg(feature = "spatial")]
pub use nvgt_spatial::{BinauralRenderer, SoundEnvironment, Vec3};

#[cfg(feature = "payload")]
pub use nvgt_payload as payload;

#[cfg(feature = "payload")]
pub use nvgt_payload::{discover_payload_start, read_trailer, write_trailer, LoadedPayload, Payload, Platform};

mod error;
mod runtime;

pub use error::{Error, Result};
pub use runtime::{NvgtRuntime, NvgtRuntimeBuilder};

/// Convenience prelude for common imports.
pub mod prelude {
    pub use crate::{Error, NvgtRuntime, NvgtRuntimeBuilder, Result};

    #[cfg(feature = "pack")]
    pub use crate::Pack;

    #[cfg(feature = "soundio")]
    pub use crate::{Protocol, SoundService};

    #[cfg(feature = "mixer")]
    pub use crate::{Mixer, SoundSource};

    #[cfg(feature = "spatial")]
    pub use crate::{SoundEnvironment, Vec3};

    #[cfg(feature = "payload")]
    pub use crate::Payload;
}
