//! Sound service: a per-process registry of protocols and filters resolving named
//! resources into input streams for the audio engine, plugging in filesystem,
//! memory, pack, or user-supplied protocols behind a uniform triplet-keyed cache.

mod directive;
mod error;
mod filter;
mod protocol;
mod registry;

pub use directive::{Directive, MemoryRegistration};
pub use error::{Result, SoundIoError};
pub use filter::{EncryptionFilter, Filter, NullFilter};
pub use protocol::{FilesystemProtocol, MemoryProtocol, PackProtocol, Protocol};
#[cfg(feature = "http")]
pub use protocol::HttpProtocol;
pub use registry::{triplet_key, SoundService};
