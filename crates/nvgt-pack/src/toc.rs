//! In-memory table of contents: name -> {offset, size}, preserving insertion order
//! while write-mode appends and read-mode lookups both stay O(1)/O(log n).

use std::collections::HashMap;
use std::io::{self, Read, Write};

use crc32fast::Hasher as Crc32;

use crate::error::{PackError, Result};
use crate::varint;

pub const MAX_NAME_LEN: usize = 65535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub name: String,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Default)]
pub struct Toc {
    by_name: HashMap<String, usize>,
    entries: Vec<TocEntry>,
}

impl Toc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    pub fn get(&self, name: &str) -> Option<&TocEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Appends a new entry at `offset = 64 + sum(prior sizes)`, rejecting duplicates
    /// and oversized names up front so the data region is never written for a name
    /// that will fail the TOC invariant check.
    pub fn push(&mut self, name: &str, size: u64) -> Result<u64> {
        if name.len() > MAX_NAME_LEN {
            return Err(PackError::NameTooLong(name.len()));
        }
        if self.by_name.contains_key(name) {
            return Err(PackError::DuplicateName(name.to_string()));
        }
        let offset = 64 + self.entries.iter().map(|e| e.size).sum::<u64>();
        let index = self.entries.len();
        self.entries.push(TocEntry {
            name: name.to_string(),
            offset,
            size,
        });
        self.by_name.insert(name.to_string(), index);
        Ok(offset)
    }

    /// Writes the TOC region (§3) and returns its CRC-32, for the header rewrite
    /// that follows finalisation.
    pub fn write_and_checksum<W: Write>(&self, w: &mut W) -> io::Result<u32> {
        let mut hasher = Crc32::new();
        let mut crc_writer = ChecksummingWriter {
            inner: w,
            hasher: &mut hasher,
        };
        for entry in &self.entries {
            let name_bytes = entry.name.as_bytes();
            varint::write_u64(&mut crc_writer, name_bytes.len() as u64)?;
            crc_writer.write_all(name_bytes)?;
            varint::write_u64(&mut crc_writer, entry.size)?;
        }
        Ok(hasher.finalize())
    }

    /// Parses entries from `r` until `stop_at` bytes have been consumed,
    /// validating every invariant from §4.1's loading contract along the way.
    pub fn read_until<R: Read>(r: &mut R, stop_at: u64) -> Result<(Self, u32)> {
        let mut hasher = Crc32::new();
        let mut toc = Toc::new();
        let mut consumed = 0u64;
        let mut running_offset = 64u64;

        struct Counting<'a, R> {
            inner: &'a mut R,
            hasher: &'a mut Crc32,
            consumed: &'a mut u64,
        }
        impl<'a, R: Read> Read for Counting<'a, R> {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                let n = self.inner.read(buf)?;
                self.hasher.update(&buf[..n]);
                *self.consumed += n as u64;
                Ok(n)
            }
        }

        while consumed < stop_at {
            let mut counting = Counting {
                inner: r,
                hasher: &mut hasher,
                consumed: &mut consumed,
            };
            let name_len = varint::read_u64(&mut counting)? as usize;
            if name_len > MAX_NAME_LEN {
                return Err(PackError::NameTooLong(name_len));
            }
            let mut name_bytes = vec![0u8; name_len];
            counting.read_exact(&mut name_bytes)?;
            let name = String::from_utf8(name_bytes).map_err(|_| PackError::InvalidUtf8Name)?;
            let size = varint::read_u64(&mut counting)?;

            if toc.by_name.contains_key(&name) {
                return Err(PackError::DuplicateName(name));
            }
            let index = toc.entries.len();
            toc.entries.push(TocEntry {
                name: name.clone(),
                offset: running_offset,
                size,
            });
            toc.by_name.insert(name, index);
            running_offset += size;
        }
        Ok((toc, hasher.finalize()))
    }
}

struct ChecksummingWriter<'a, W> {
    inner: &'a mut W,
    hasher: &'a mut Crc32,
}

impl<'a, W: Write> Write for ChecksummingWriter<'a, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
