//! Filters: chained transforms over an already-opened input stream.

use std::io::{Read, Seek};

use nvgt_pack::ChaChaReader;

use crate::directive::Directive;
use crate::error::Result;

pub trait Filter: Send + Sync {
    fn wrap(&self, input: Box<dyn Read + Send>, directive: &Directive) -> Result<Box<dyn Read + Send>>;
}

/// The identity filter, always registered at slot 0.
pub struct NullFilter;

impl Filter for NullFilter {
    fn wrap(&self, input: Box<dyn Read + Send>, _directive: &Directive) -> Result<Box<dyn Read + Send>> {
        Ok(input)
    }
}

/// ChaCha20 decryption. If the wrapped source doesn't validate as an encrypted
/// stream (wrong magic) the filter passes the source through unchanged rather than
/// failing the whole resolution -- callers that don't know in advance whether a
/// given resource is encrypted rely on this.
pub struct EncryptionFilter;

impl Filter for EncryptionFilter {
    fn wrap(&self, mut input: Box<dyn Read + Send>, directive: &Directive) -> Result<Box<dyn Read + Send>> {
        let Some(key) = directive.key() else {
            return Ok(input);
        };
        let mut buf = Vec::new();
        input.read_to_end(&mut buf)?;
        match ChaChaReader::new(SeekableBuffer::new(buf.clone()), key.as_bytes()) {
            Ok(decrypted) => Ok(Box::new(decrypted)),
            Err(_) => {
                tracing::debug!("encryption filter: magic mismatch, passing source through");
                Ok(Box::new(SeekableBuffer::new(buf)))
            }
        }
    }
}

/// `ChaChaReader` needs `Seek`, but protocols only promise `Read`. Buffer the
/// source fully so the filter can attempt decryption and, on rejection, still hand
/// the caller a fresh reader over the original bytes.
struct SeekableBuffer {
    cursor: std::io::Cursor<Vec<u8>>,
}

impl SeekableBuffer {
    fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: std::io::Cursor::new(buf),
        }
    }
}

impl Read for SeekableBuffer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for SeekableBuffer {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}
