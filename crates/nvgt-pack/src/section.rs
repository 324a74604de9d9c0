//! A buffered window over a source stream, bounded to `[start, start + size)`.
//!
//! Grounded on the pack format's need to read a single TOC entry's bytes out of a
//! shared backing file/stream without exposing the rest of it, and to let an
//! already-section-bounded stream (an embedded pack's slice of the host binary) be
//! wrapped by a further section (a single file's slice of that pack).

use std::io::{self, BufReader, Read, Seek, SeekFrom};

pub struct SectionReader<R> {
    inner: BufReader<R>,
    start: u64,
    size: u64,
    /// Position relative to `start`; kept independently of `inner`'s position so
    /// `seek(0, Current)` can report a stable value even with buffered lookahead.
    pos: u64,
}

impl<R: Read + Seek> SectionReader<R> {
    pub fn new(mut source: R, start: u64, size: u64) -> io::Result<Self> {
        source.seek(SeekFrom::Start(start))?;
        Ok(Self {
            inner: BufReader::new(source),
            start,
            size,
            pos: 0,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read + Seek> Read for SectionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.size.saturating_sub(self.pos);
        if remaining == 0 {
            return Ok(0);
        }
        let want = (buf.len() as u64).min(remaining) as usize;
        let n = self.inner.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for SectionReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(abs) => {
                if abs > self.size {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "seek past end of section",
                    ));
                }
                abs
            }
            SeekFrom::End(off) => {
                let base = self.size as i64;
                let target = base + off;
                if target < 0 || target as u64 > self.size {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "seek past end of section",
                    ));
                }
                target as u64
            }
            SeekFrom::Current(0) => return Ok(self.pos),
            SeekFrom::Current(off) => {
                let target = self.pos as i64 + off;
                if target < 0 || target as u64 > self.size {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "seek out of section bounds",
                    ));
                }
                target as u64
            }
        };
        // `BufReader::seek` repositions the source and discards the stale
        // lookahead buffer for us.
        self.inner.seek(SeekFrom::Start(self.start + target))?;
        self.pos = target;
        Ok(self.pos)
    }
}
