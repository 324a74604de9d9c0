//! Protocols: "open a named resource as an input stream".

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::directive::Directive;
use crate::error::{Result, SoundIoError};

pub trait Protocol: Send + Sync {
    fn open_uri(&self, name: &str, directive: &Directive) -> Result<Box<dyn Read + Send>>;

    /// A per-directive suffix appended to triplet keys so the resource manager
    /// doesn't alias two distinct registrations under the same cache key.
    fn suffix(&self, directive: &Directive) -> String {
        let _ = directive;
        String::new()
    }
}

/// Opens `name` as a filesystem path, ignoring the directive.
pub struct FilesystemProtocol;

impl Protocol for FilesystemProtocol {
    fn open_uri(&self, name: &str, _directive: &Directive) -> Result<Box<dyn Read + Send>> {
        let file = File::open(Path::new(name))?;
        Ok(Box::new(file))
    }
}

/// Opens a cursor over a registered in-memory byte range, ignoring `name` (the
/// range was fixed at registration time and is carried entirely in the directive).
pub struct MemoryProtocol;

impl Protocol for MemoryProtocol {
    fn open_uri(&self, _name: &str, directive: &Directive) -> Result<Box<dyn Read + Send>> {
        match directive {
            Directive::Memory(reg) => Ok(Box::new(Cursor::new(reg.bytes.to_vec()))),
            _ => Err(SoundIoError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "memory protocol requires a Memory directive",
            ))),
        }
    }

    fn suffix(&self, directive: &Directive) -> String {
        match directive {
            Directive::Memory(reg) => reg.tag.clone(),
            _ => String::new(),
        }
    }
}

/// Delegates `open_uri` to a shared pack handle; `name` is the internal pack entry
/// name, not a filesystem path.
pub struct PackProtocol;

impl Protocol for PackProtocol {
    fn open_uri(&self, name: &str, directive: &Directive) -> Result<Box<dyn Read + Send>> {
        match directive {
            Directive::Pack(pack) => {
                let pack = pack.lock();
                Ok(pack.get_file(name)?)
            }
            _ => Err(SoundIoError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "pack protocol requires a Pack directive",
            ))),
        }
    }
}

#[cfg(feature = "http")]
pub struct HttpProtocol;

#[cfg(feature = "http")]
impl Protocol for HttpProtocol {
    fn open_uri(&self, name: &str, _directive: &Directive) -> Result<Box<dyn Read + Send>> {
        let response = reqwest::blocking::get(name)?;
        let bytes = response.bytes()?;
        Ok(Box::new(Cursor::new(bytes.to_vec())))
    }
}
