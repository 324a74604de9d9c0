//! A bidirectional deflate/inflate adapter around the decrypted plaintext
//! blob: a grow-on-overflow deflating writer for the producer side, and a
//! sync-flush inflating reader for the consumer side whose "bytes read"
//! counter can be reset independent of the underlying inflate state — so once
//! headers and the plugin manifest have been consumed, later errors report an
//! offset relative to the start of the bytecode rather than the whole stream.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::Result;

pub struct BytecodeWriter {
    encoder: ZlibEncoder<Vec<u8>>,
}

impl Default for BytecodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BytecodeWriter {
    pub fn new() -> Self {
        Self { encoder: ZlibEncoder::new(Vec::new(), Compression::default()) }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.encoder.write_all(data)?;
        Ok(())
    }

    /// Emits the deflate finish marker and returns the compressed bytes.
    pub fn finish(self) -> Result<Vec<u8>> {
        Ok(self.encoder.finish()?)
    }
}

pub struct BytecodeReader<R> {
    inflater: ZlibDecoder<R>,
    cursor: u64,
    terminal: bool,
}

impl<R: Read> BytecodeReader<R> {
    pub fn new(source: R) -> Self {
        Self { inflater: ZlibDecoder::new(source), cursor: 0, terminal: false }
    }

    /// Zeroes the "bytes read" counter without disturbing inflate state.
    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }
}

impl<R: Read> Read for BytecodeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.terminal {
            return Ok(0);
        }
        match self.inflater.read(buf) {
            Ok(n) => {
                self.cursor += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.terminal = true;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_through_deflate_inflate() {
        let mut writer = BytecodeWriter::new();
        writer.write(b"some bytecode-shaped bytes, repeated ").unwrap();
        writer.write(b"some bytecode-shaped bytes, repeated ").unwrap();
        let compressed = writer.finish().unwrap();

        let mut reader = BytecodeReader::new(Cursor::new(compressed));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"some bytecode-shaped bytes, repeated some bytecode-shaped bytes, repeated ");
    }

    #[test]
    fn reset_cursor_zeroes_counter_without_touching_decode_progress() {
        let mut writer = BytecodeWriter::new();
        writer.write(b"headerBODYBODYBODY").unwrap();
        let compressed = writer.finish().unwrap();

        let mut reader = BytecodeReader::new(Cursor::new(compressed));
        let mut header = [0u8; 6];
        reader.read_exact(&mut header).unwrap();
        assert_eq!(&header, b"header");
        assert_eq!(reader.cursor(), 6);

        reader.reset_cursor();
        assert_eq!(reader.cursor(), 0);

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"BODYBODYBODY");
        assert_eq!(reader.cursor(), 12);
    }
}
