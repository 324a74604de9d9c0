use thiserror::Error;

#[derive(Error, Debug)]
pub enum SoundIoError {
    #[error("no protocol registered at slot {0}")]
    NoSuchProtocol(usize),

    #[error("no filter registered at slot {0}")]
    NoSuchFilter(usize),

    #[error("no resolution recorded for triplet {0:?}")]
    UnknownTriplet(String),

    #[error(transparent)]
    Pack(#[from] nvgt_pack::PackError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SoundIoError>;
