//! The pack store: an indexed, optionally-encrypted, content-addressable container.
//! Grounded on `pack.cpp`/`pack.h`: a pack is opened either for writing or for
//! reading, never both, and composes the section/encryption streams of §4.2/§4.3.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::crypto::{ChaChaReader, ChaChaWriter};
use crate::error::{PackError, Result};
use crate::section::SectionReader;
use crate::toc::Toc;

pub const MAGIC: u32 = 0xDADF_ADED;
pub const HEADER_LEN: u64 = 64;

trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

trait WriteSeek: Write + Seek + Send {}
impl<T: Write + Seek + Send> WriteSeek for T {}

enum WriteSink {
    Plain(Box<dyn WriteSeek>),
    Encrypted(ChaChaWriter<Box<dyn WriteSeek>>),
}

impl WriteSink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            WriteSink::Plain(w) => w.write_all(buf),
            WriteSink::Encrypted(w) => w.write_all(buf),
        }
    }

    fn rewrite_header(&mut self, header: &[u8; HEADER_LEN as usize]) -> Result<()> {
        match self {
            WriteSink::Plain(w) => {
                w.seek(SeekFrom::Start(0))?;
                w.write_all(header)?;
            }
            WriteSink::Encrypted(w) => {
                w.rewind_to_start()?;
                w.write_all(header)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            WriteSink::Plain(w) => w.flush(),
            WriteSink::Encrypted(w) => w.flush(),
        }
    }
}

struct WritingPack {
    sink: WriteSink,
    toc: Toc,
}

struct ReadingPack {
    /// The already section-bounded, already-decrypted byte source the data region
    /// lives in; `get_file` layers a further `SectionReader` over a cloned handle
    /// reopened at the same path, since streams here aren't `Clone`.
    reopen: Box<dyn Fn() -> Result<Box<dyn ReadSeek>> + Send>,
    key: Option<Vec<u8>>,
    section_bounds: Option<(u64, u64)>,
    toc: Toc,
}

enum State {
    Closed,
    Writing(WritingPack),
    Reading(ReadingPack),
}

/// An indexed, optionally-encrypted container file. See module docs.
pub struct Pack {
    state: State,
}

impl Default for Pack {
    fn default() -> Self {
        Self::new()
    }
}

impl Pack {
    pub fn new() -> Self {
        Self {
            state: State::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, State::Closed)
    }

    /// Opens `filename` for writing. Writes a zeroed 64-byte header up front; if
    /// `key` is non-empty the sink is wrapped in a ChaCha20 encryption stream.
    pub fn create(&mut self, filename: impl AsRef<Path>, key: &str) -> Result<()> {
        let file = File::create(filename.as_ref())?;
        let boxed: Box<dyn WriteSeek> = Box::new(file);
        let mut sink = if key.is_empty() {
            WriteSink::Plain(boxed)
        } else {
            WriteSink::Encrypted(ChaChaWriter::new(boxed, key.as_bytes(), None)?)
        };
        sink.write_all(&[0u8; HEADER_LEN as usize])?;
        self.state = State::Writing(WritingPack {
            sink,
            toc: Toc::new(),
        });
        Ok(())
    }

    /// Opens `filename` for reading. If `pack_offset`/`pack_size` are both zero this
    /// behaves as a plain file open; otherwise the file is treated as an embedded
    /// pack occupying that byte range of `filename` (normally the host binary).
    pub fn open(
        &mut self,
        filename: impl AsRef<Path>,
        key: &str,
        pack_offset: u64,
        pack_size: u64,
    ) -> Result<()> {
        let path = filename.as_ref().to_path_buf();
        let section_bounds = if pack_offset == 0 && pack_size == 0 {
            None
        } else {
            Some((pack_offset, pack_size))
        };
        let key_owned = if key.is_empty() {
            None
        } else {
            Some(key.as_bytes().to_vec())
        };

        let open_base = {
            let path = path.clone();
            let section_bounds = section_bounds;
            move || -> Result<Box<dyn ReadSeek>> {
                let file = File::open(&path)?;
                let boxed: Box<dyn ReadSeek> = match section_bounds {
                    Some((offset, size)) => Box::new(SectionReader::new(file, offset, size)?),
                    None => Box::new(file),
                };
                Ok(boxed)
            }
        };

        // The TOC offset is a position within the pack's own plaintext byte space,
        // so the raw container size has to be converted down to plaintext terms
        // before validating it -- the ChaCha stream only supports forward seeks,
        // so this is computed from the container size rather than by seeking to
        // its end through the decrypting reader.
        let raw_size = match section_bounds {
            Some((_, size)) => size,
            None => std::fs::metadata(&path)?.len(),
        };
        let plaintext_len = match &key_owned {
            Some(_) => raw_size.saturating_sub(crate::crypto::STREAM_OVERHEAD),
            None => raw_size,
        };

        let source = open_base()?;
        let mut decrypted: Box<dyn ReadSeek> = match &key_owned {
            Some(k) => Box::new(ChaChaReader::new(source, k)?),
            None => source,
        };

        let mut magic_bytes = [0u8; 4];
        decrypted.read_exact(&mut magic_bytes)?;
        let magic = u32::from_le_bytes(magic_bytes);
        if magic != MAGIC {
            return Err(PackError::BadMagic { found: magic });
        }
        let mut toc_offset_bytes = [0u8; 8];
        decrypted.read_exact(&mut toc_offset_bytes)?;
        let toc_offset = u64::from_le_bytes(toc_offset_bytes);
        let mut crc_bytes = [0u8; 4];
        decrypted.read_exact(&mut crc_bytes)?;
        let stored_crc = u32::from_le_bytes(crc_bytes);

        if toc_offset < HEADER_LEN || toc_offset >= plaintext_len {
            return Err(PackError::TocOffsetOutOfRange {
                toc_offset,
                file_size: plaintext_len,
            });
        }
        decrypted.seek(SeekFrom::Start(toc_offset))?;
        let stop_at = plaintext_len - toc_offset;
        let (toc, computed_crc) = Toc::read_until(&mut decrypted, stop_at)?;
        if computed_crc != stored_crc {
            return Err(PackError::TocChecksumMismatch {
                expected: stored_crc,
                computed: computed_crc,
            });
        }
        let total_size: u64 = toc.total_size();
        if total_size + HEADER_LEN != toc_offset {
            return Err(PackError::SizeSumMismatch {
                computed: total_size + HEADER_LEN,
                toc_offset,
            });
        }

        self.state = State::Reading(ReadingPack {
            reopen: Box::new(open_base),
            key: key_owned,
            section_bounds,
            toc,
        });
        Ok(())
    }

    /// Finalises a write-mode pack: writes the TOC, computes its CRC, and rewrites
    /// the header in place. No-op (but not an error) if already closed.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Writing(mut w) => {
                let toc_offset = HEADER_LEN + w.toc.total_size();
                let crc = match &mut w.sink {
                    WriteSink::Plain(sink) => w.toc.write_and_checksum(sink)?,
                    WriteSink::Encrypted(sink) => w.toc.write_and_checksum(sink)?,
                };
                w.sink.flush()?;
                let mut header = [0u8; HEADER_LEN as usize];
                header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
                header[4..12].copy_from_slice(&toc_offset.to_le_bytes());
                header[12..16].copy_from_slice(&crc.to_le_bytes());
                w.sink.rewrite_header(&header)?;
                w.sink.flush()?;
                Ok(())
            }
            State::Reading(_) | State::Closed => Ok(()),
        }
    }

    fn writing_mut(&mut self) -> Result<&mut WritingPack> {
        match &mut self.state {
            State::Writing(w) => Ok(w),
            _ => Err(PackError::WrongMode),
        }
    }

    fn reading(&self) -> Result<&ReadingPack> {
        match &self.state {
            State::Reading(r) => Ok(r),
            _ => Err(PackError::WrongMode),
        }
    }

    pub fn add_memory(&mut self, internal_name: &str, bytes: &[u8]) -> Result<()> {
        self.add_stream(internal_name, &mut io::Cursor::new(bytes))
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, internal_name: &str) -> Result<()> {
        let mut file = File::open(path.as_ref())?;
        self.add_stream(internal_name, &mut file)
    }

    pub fn add_stream<R: Read>(&mut self, internal_name: &str, input: &mut R) -> Result<()> {
        let bytes = {
            let mut buf = Vec::new();
            input.read_to_end(&mut buf)?;
            buf
        };
        let w = self.writing_mut()?;
        w.toc.push(internal_name, bytes.len() as u64)?;
        w.sink.write_all(&bytes)?;
        Ok(())
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.reading().map(|r| r.toc.contains(name)).unwrap_or(false)
    }

    pub fn get_file_size(&self, name: &str) -> Option<u64> {
        self.reading().ok().and_then(|r| r.toc.get(name)).map(|e| e.size)
    }

    pub fn get_file_count(&self) -> usize {
        self.reading().map(|r| r.toc.len()).unwrap_or(0)
    }

    pub fn list_files(&self) -> Vec<String> {
        self.reading()
            .map(|r| r.toc.names().map(|s| s.to_string()).collect())
            .unwrap_or_default()
    }

    /// Returns a stream reading only the named file's bytes, zero-based, by
    /// re-opening the backing source and layering: optional outer section ->
    /// optional decryption -> section over the entry's (offset, size).
    pub fn get_file(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        let r = self.reading()?;
        let entry = r.toc.get(name).ok_or_else(|| PackError::NotFound(name.to_string()))?;
        let base = (r.reopen)()?;
        let decrypted: Box<dyn ReadSeek> = match &r.key {
            Some(k) => Box::new(ChaChaReader::new(base, k)?),
            None => base,
        };
        let section = SectionReader::new(decrypted, entry.offset, entry.size)?;
        Ok(Box::new(section))
    }

    pub fn extract_file(&self, name: &str, output_path: impl AsRef<Path>) -> Result<()> {
        let mut input = self.get_file(name)?;
        let mut out = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(output_path.as_ref())?;
        io::copy(&mut input, &mut out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn s1_pack_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.pack");

        let mut pack = Pack::new();
        pack.create(&path, "").unwrap();
        pack.add_memory("dir/one.txt", b"abc").unwrap();
        pack.add_memory("two.bin", &[0x00, 0xff, 0x10]).unwrap();
        pack.close().unwrap();

        let mut pack = Pack::new();
        pack.open(&path, "", 0, 0).unwrap();
        assert!(pack.file_exists("dir/one.txt"));
        assert_eq!(pack.get_file_size("two.bin"), Some(3));
        let mut buf = Vec::new();
        pack.get_file("two.bin").unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, vec![0x00, 0xff, 0x10]);
        let mut names = pack.list_files();
        names.sort();
        assert_eq!(names, vec!["dir/one.txt".to_string(), "two.bin".to_string()]);
    }

    #[test]
    fn s2_encrypted_pack_round_trip_and_wrong_key_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("e.pack");

        let mut pack = Pack::new();
        pack.create(&path, "hunter2").unwrap();
        pack.add_memory("greet", b"hi").unwrap();
        pack.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.len() > 24);

        let mut pack = Pack::new();
        pack.open(&path, "hunter2", 0, 0).unwrap();
        let mut buf = Vec::new();
        pack.get_file("greet").unwrap().read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hi");

        let mut pack = Pack::new();
        assert!(pack.open(&path, "wrong", 0, 0).is_err());
    }

    #[test]
    fn empty_pack_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.pack");
        let mut pack = Pack::new();
        pack.create(&path, "").unwrap();
        pack.close().unwrap();

        let mut pack = Pack::new();
        pack.open(&path, "", 0, 0).unwrap();
        assert_eq!(pack.get_file_count(), 0);
    }

    #[test]
    fn corrupted_toc_crc_fails_to_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.pack");
        let mut pack = Pack::new();
        pack.create(&path, "").unwrap();
        pack.add_memory("x", b"hello").unwrap();
        pack.close().unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&path, &bytes).unwrap();

        let mut pack = Pack::new();
        assert!(pack.open(&path, "", 0, 0).is_err());
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dup.pack");
        let mut pack = Pack::new();
        pack.create(&path, "").unwrap();
        pack.add_memory("x", b"1").unwrap();
        assert!(pack.add_memory("x", b"2").is_err());
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_file_sets_round_trip(
            files in proptest::collection::vec(
                ("[a-z][a-z0-9_]{0,12}", proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)),
                0..8,
            ),
            key in proptest::option::of("[!-~]{1,16}"),
        ) {
            // Names must be unique; dedup by keeping the first occurrence.
            let mut seen = std::collections::HashSet::new();
            let files: Vec<(String, Vec<u8>)> = files.into_iter().filter(|(name, _)| seen.insert(name.clone())).collect();

            let dir = tempdir().unwrap();
            let path = dir.path().join("prop.pack");
            let key_str = key.clone().unwrap_or_default();

            let mut pack = Pack::new();
            pack.create(&path, &key_str).unwrap();
            for (name, bytes) in &files {
                pack.add_memory(name, bytes).unwrap();
            }
            pack.close().unwrap();

            let mut pack = Pack::new();
            pack.open(&path, &key_str, 0, 0).unwrap();
            proptest::prop_assert_eq!(pack.get_file_count(), files.len());
            for (name, bytes) in &files {
                proptest::prop_assert!(pack.file_exists(name));
                let mut buf = Vec::new();
                pack.get_file(name).unwrap().read_to_end(&mut buf).unwrap();
                proptest::prop_assert_eq!(&buf, bytes);
            }
        }
    }
}
