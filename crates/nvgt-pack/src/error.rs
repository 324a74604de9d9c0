//! Error taxonomy for the pack store, matching the abstract kinds (Format / Io /
//! State) that every subsystem in this workspace reports through.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("bad magic: expected 0xDADFADED, found {found:#010X}")]
    BadMagic { found: u32 },

    #[error("TOC checksum mismatch: expected {expected:#010X}, computed {computed:#010X}")]
    TocChecksumMismatch { expected: u32, computed: u32 },

    #[error("TOC offset {toc_offset} is out of range for a file of size {file_size}")]
    TocOffsetOutOfRange { toc_offset: u64, file_size: u64 },

    #[error("entry size sum + 64 ({computed}) does not match TOC offset ({toc_offset})")]
    SizeSumMismatch { computed: u64, toc_offset: u64 },

    #[error("entry name is not valid UTF-8")]
    InvalidUtf8Name,

    #[error("entry name length {0} exceeds the 65535 byte limit")]
    NameTooLong(usize),

    #[error("duplicate entry name: {0}")]
    DuplicateName(String),

    #[error("no such file in pack: {0}")]
    NotFound(String),

    #[error("pack is not open for this operation")]
    WrongMode,

    #[error("encrypted stream magic mismatch (wrong key or not an encrypted stream)")]
    EncryptionMagicMismatch,

    #[error("unsupported seek on write-mode encryption stream")]
    UnsupportedSeek,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PackError>;
