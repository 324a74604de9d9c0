//! ChaCha20 encryption filter used to optionally wrap an entire pack file.
//!
//! Key derivation is BLAKE2b-256 over the caller-supplied key bytes (never the raw
//! key); the 24-byte nonce and XChaCha20's extended nonce space give us the block
//! counter control this format's limited seek support relies on.

use std::io::{self, Read, Seek, SeekFrom, Write};

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20::XChaCha20;
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{PackError, Result};

const NONCE_LEN: usize = 24;
const MAGIC: u32 = 0xACEF_ADED;
const BLOCK_SIZE: u64 = 64;

/// Bytes of cleartext nonce + encrypted magic prepended before payload offset 0.
pub const STREAM_OVERHEAD: u64 = NONCE_LEN as u64 + 4;

type Blake2b256 = Blake2b<U32>;

fn derive_key(key_bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(key_bytes);
    let digest = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

/// Writes a ChaCha20-encrypted stream: `nonce (cleartext) | cipher(magic | payload)`.
pub struct ChaChaWriter<W> {
    sink: W,
    cipher: XChaCha20,
    key: [u8; 32],
}

impl<W: Write + Seek> ChaChaWriter<W> {
    pub fn new(mut sink: W, key_bytes: &[u8], nonce: Option<[u8; NONCE_LEN]>) -> io::Result<Self> {
        let key = derive_key(key_bytes);
        let nonce = nonce.unwrap_or_else(|| {
            let mut n = [0u8; NONCE_LEN];
            rand::thread_rng().fill_bytes(&mut n);
            n
        });
        sink.write_all(&nonce)?;
        let cipher = XChaCha20::new(&key.into(), &nonce.into());
        let mut writer = Self { sink, cipher, key };
        writer.write_magic()?;
        Ok(writer)
    }

    fn write_magic(&mut self) -> io::Result<()> {
        let mut buf = MAGIC.to_le_bytes();
        self.cipher.apply_keystream(&mut buf);
        self.sink.write_all(&buf)
    }

    /// Only `(0, Start)` (pack header rewrite) and `(0, Current)` (tell) are
    /// supported, matching the write-side seek restrictions of this format. Seeks
    /// the sink back to just past the nonce, resets the counter to 0, and re-emits
    /// the magic so the keystream stays in sync for the header bytes that follow.
    pub fn rewind_to_start(&mut self) -> Result<()> {
        self.sink.seek(SeekFrom::Start(NONCE_LEN as u64))?;
        self.cipher.seek(0u64);
        self.write_magic().map_err(PackError::from)
    }
}

impl<W: Write> Write for ChaChaWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut scratch = buf.to_vec();
        self.cipher.apply_keystream(&mut scratch);
        self.sink.write_all(&scratch)?;
        scratch.zeroize();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl<W> Drop for ChaChaWriter<W> {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Reads a ChaCha20-encrypted stream, verifying the magic on construction.
pub struct ChaChaReader<R> {
    source: R,
    cipher: XChaCha20,
    key: [u8; 32],
    /// Position within the source right after the nonce, i.e. where payload-relative
    /// offset 0 begins in the underlying stream.
    payload_base: u64,
}

impl<R: Read + Seek> ChaChaReader<R> {
    pub fn new(mut source: R, key_bytes: &[u8]) -> Result<Self> {
        let key = derive_key(key_bytes);
        let mut nonce = [0u8; NONCE_LEN];
        source.read_exact(&mut nonce)?;
        let mut cipher = XChaCha20::new(&key.into(), &nonce.into());
        let mut magic = [0u8; 4];
        source.read_exact(&mut magic)?;
        cipher.apply_keystream(&mut magic);
        if u32::from_le_bytes(magic) != MAGIC {
            return Err(PackError::EncryptionMagicMismatch);
        }
        let payload_base = NONCE_LEN as u64 + 4;
        Ok(Self {
            source,
            cipher,
            key,
            payload_base,
        })
    }
}

impl<R: Read> Read for ChaChaReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.source.read(buf)?;
        self.cipher.apply_keystream(&mut buf[..n]);
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for ChaChaReader<R> {
    /// Seeks are re-keyed at the enclosing 64-byte block boundary and any
    /// intra-block offset is consumed by discarding keystream bytes, exactly as the
    /// format's read-side seek semantics describe.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(abs) => abs,
            SeekFrom::Current(off) => {
                // `cipher.current_pos()` counts the 4-byte magic consumed in
                // `new()` before any payload byte, so it reads 4 ahead of the
                // payload-relative position this seek operates in.
                let current: u64 = self.cipher.current_pos() - 4;
                (current as i64 + off).max(0) as u64
            }
            SeekFrom::End(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "ChaCha stream does not track an end position",
                ))
            }
        };
        let block = target / BLOCK_SIZE;
        let intra = target % BLOCK_SIZE;
        self.source
            .seek(SeekFrom::Start(self.payload_base + block * BLOCK_SIZE))?;
        self.cipher.seek(block * BLOCK_SIZE);
        if intra > 0 {
            let mut discard = vec![0u8; intra as usize];
            self.read_exact(&mut discard)?;
        }
        Ok(target)
    }
}

impl<R> Drop for ChaChaReader<R> {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_plaintext() {
        let plaintext = b"the quick brown fox jumps over the lazy dog".to_vec();
        let mut sink = Vec::new();
        {
            let mut w = ChaChaWriter::new(&mut sink, b"hunter2", None).unwrap();
            w.write_all(&plaintext).unwrap();
        }
        let mut r = ChaChaReader::new(Cursor::new(sink), b"hunter2").unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, plaintext);
    }

    #[test]
    fn wrong_key_fails_magic_check() {
        let mut sink = Vec::new();
        {
            let mut w = ChaChaWriter::new(&mut sink, b"hunter2", None).unwrap();
            w.write_all(b"hi").unwrap();
        }
        let err = ChaChaReader::new(Cursor::new(sink), b"wrong").unwrap_err();
        assert!(matches!(err, PackError::EncryptionMagicMismatch));
    }

    #[test]
    fn seek_to_arbitrary_offset_reads_correct_bytes() {
        let plaintext: Vec<u8> = (0u8..=255).cycle().take(1000).collect();
        let mut sink = Vec::new();
        {
            let mut w = ChaChaWriter::new(&mut sink, b"k", None).unwrap();
            w.write_all(&plaintext).unwrap();
        }
        let mut r = ChaChaReader::new(Cursor::new(sink), b"k").unwrap();
        r.seek(SeekFrom::Start(137)).unwrap();
        let mut out = [0u8; 20];
        r.read_exact(&mut out).unwrap();
        assert_eq!(&out[..], &plaintext[137..157]);
    }

    #[test]
    fn stream_position_is_a_pure_query_that_does_not_skip_bytes() {
        let plaintext = b"0123456789abcdef".to_vec();
        let mut sink = Vec::new();
        {
            let mut w = ChaChaWriter::new(&mut sink, b"k", None).unwrap();
            w.write_all(&plaintext).unwrap();
        }
        let mut r = ChaChaReader::new(Cursor::new(sink), b"k").unwrap();
        assert_eq!(r.stream_position().unwrap(), 0);
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, plaintext, "querying the position must not discard payload bytes");
    }
}
