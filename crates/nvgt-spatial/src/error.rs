use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpatialError {
    #[error("unknown material {0:?}")]
    UnknownMaterial(String),

    #[error("source is already attached to an environment")]
    AlreadyAttached,

    #[error("source is not attached to this environment")]
    NotAttached,

    #[error(transparent)]
    Mixer(#[from] nvgt_mixer::MixerError),
}

pub type Result<T> = std::result::Result<T, SpatialError>;
