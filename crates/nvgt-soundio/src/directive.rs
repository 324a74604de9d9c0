//! Opaque per-registration configuration handed to a [`crate::Protocol`] or
//! [`crate::Filter`]. Directives are cheap to clone (everything heavy lives behind
//! an `Arc`) since the same directive is retained for the lifetime of a triplet
//! resolution and handed to `open_uri`/`wrap` each time it is resolved.

use std::sync::Arc;

use parking_lot::Mutex;

/// A registered in-memory byte range, tagged with a unique suffix so two
/// registrations under the same logical name don't collide in the audio engine's
/// resource cache.
#[derive(Clone)]
pub struct MemoryRegistration {
    pub bytes: Arc<Vec<u8>>,
    pub tag: String,
}

#[derive(Clone)]
pub enum Directive {
    None,
    /// An encryption key, used by the built-in encryption filter and the pack
    /// protocol alike.
    Key(Arc<str>),
    /// A pack handle shared with the pack protocol.
    Pack(Arc<Mutex<nvgt_pack::Pack>>),
    Memory(MemoryRegistration),
}

impl Directive {
    pub fn key(&self) -> Option<&str> {
        match self {
            Directive::Key(k) => Some(k),
            _ => None,
        }
    }
}
