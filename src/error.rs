//! Centralized error type for the umbrella crate.
//!
//! Wraps each subsystem's own error so `?` propagates naturally across crate
//! boundaries without callers matching on five different error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "pack")]
    #[error(transparent)]
    Pack(#[from] nvgt_pack::PackError),

    #[cfg(feature = "soundio")]
    #[error(transparent)]
    SoundIo(#[from] nvgt_soundio::SoundIoError),

    #[cfg(feature = "mixer")]
    #[error(transparent)]
    Mixer(#[from] nvgt_mixer::MixerError),

    #[cfg(feature = "spatial")]
    #[error(transparent)]
    Spatial(#[from] nvgt_spatial::SpatialError),

    #[cfg(feature = "payload")]
    #[error(transparent)]
    Payload(#[from] nvgt_payload::PayloadError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
