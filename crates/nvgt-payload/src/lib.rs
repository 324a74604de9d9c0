//! The compiled-application payload format: a block of embedded packs, a
//! length-masked, AES-encrypted, deflate-compressed bytecode stream, and
//! per-platform trailer discovery so the running binary can find its own
//! payload without a dedicated container format.

mod bytecode;
mod crypto;
mod embed;
mod error;
mod payload;
mod trailer;

pub use bytecode::{BytecodeReader, BytecodeWriter};
pub use embed::{read_embedded_packs, resolve_embed, write_embedded_packs, EmbeddedPackEntry};
pub use error::{PayloadError, Result};
pub use payload::{read_trailer, write_trailer, LoadedPayload, Payload};
pub use trailer::{discover_payload_start, Platform};
