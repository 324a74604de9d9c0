use thiserror::Error;

#[derive(Error, Debug)]
pub enum MixerError {
    #[error("node already belongs to a mixer")]
    AlreadyParented,

    #[error("unknown effect type {0:?}")]
    UnknownEffectType(String),

    #[error("malformed effect spec: {0}")]
    MalformedSpec(String),

    #[error("no effect named {0:?}")]
    NoSuchEffect(String),

    #[error("effect index {0} out of range")]
    IndexOutOfRange(usize),

    #[error("source has no decoded stream")]
    NotLoaded,

    #[error(transparent)]
    SoundIo(#[from] nvgt_soundio::SoundIoError),

    #[error(transparent)]
    Pack(#[from] nvgt_pack::PackError),

    #[error(transparent)]
    Decode(#[from] symphonia::core::errors::Error),

    #[error(transparent)]
    Cpal(#[from] cpal::BuildStreamError),

    #[error(transparent)]
    CpalPlay(#[from] cpal::PlayStreamError),

    #[error(transparent)]
    CpalDevices(#[from] cpal::DevicesError),

    #[error("no output device available")]
    NoOutputDevice,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MixerError>;
