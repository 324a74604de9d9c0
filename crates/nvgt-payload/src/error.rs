use thiserror::Error;

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("malformed payload: {0}")]
    Format(String),

    #[error("ciphertext padding is invalid")]
    BadPadding,

    #[error(transparent)]
    Pack(#[from] nvgt_pack::PackError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PayloadError>;
