//! Ties the embedded-pack block, the length-masked bytecode framing, and
//! AES/deflate together into the producer (`write_trailer`) and consumer
//! (`read_trailer`) halves of the compiled-application payload.

use std::io::{Cursor, Read, Seek, Write};

use crate::bytecode::{BytecodeReader, BytecodeWriter};
use crate::crypto;
use crate::embed::{read_embedded_packs, write_embedded_packs, EmbeddedPackEntry};
use crate::error::Result;

use nvgt_pack::varint;

/// The constant the bytecode length is XOR-masked with before being
/// varint-encoded, so a naive byte scan of the binary doesn't turn up an
/// obviously-a-length-field value right before the ciphertext.
const BYTECODE_LENGTH_MASK: u64 = 47635;

/// Everything the payload's plaintext carries, in wire order: an opaque
/// plugin manifest (format owned by the plugin loader, not this crate), the
/// engine's property values by index, a build timestamp, then raw bytecode.
pub struct Payload {
    pub manifest: Vec<u8>,
    pub properties: Vec<u64>,
    pub build_timestamp: u64,
    pub bytecode: Vec<u8>,
    pub embedded_packs: Vec<(String, Vec<u8>)>,
}

pub struct LoadedPayload {
    pub manifest: Vec<u8>,
    pub properties: Vec<u64>,
    pub build_timestamp: u64,
    pub bytecode: Vec<u8>,
    pub embeds: Vec<EmbeddedPackEntry>,
}

fn build_plaintext(payload: &Payload) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    varint::write_u64(&mut buf, payload.manifest.len() as u64)?;
    buf.write_all(&payload.manifest)?;
    varint::write_u64(&mut buf, payload.properties.len() as u64)?;
    for prop in &payload.properties {
        varint::write_u64(&mut buf, *prop)?;
    }
    buf.write_all(&payload.build_timestamp.to_le_bytes())?;
    buf.write_all(&payload.bytecode)?;
    Ok(buf)
}

pub fn write_trailer<W: Write>(w: &mut W, payload: &Payload) -> Result<()> {
    write_embedded_packs(w, &payload.embedded_packs)?;

    let plaintext = build_plaintext(payload)?;
    let mut deflater = BytecodeWriter::new();
    deflater.write(&plaintext)?;
    let compressed = deflater.finish()?;
    let ciphertext = crypto::encrypt(&compressed);

    varint::write_u64(w, (ciphertext.len() as u64) ^ BYTECODE_LENGTH_MASK)?;
    w.write_all(&ciphertext)?;
    Ok(())
}

pub fn read_trailer<R: Read + Seek>(r: &mut R) -> Result<LoadedPayload> {
    let embeds = read_embedded_packs(r)?;

    let masked_len = varint::read_u64(r)?;
    let ciphertext_len = masked_len ^ BYTECODE_LENGTH_MASK;
    let mut ciphertext = vec![0u8; ciphertext_len as usize];
    r.read_exact(&mut ciphertext)?;

    let compressed = crypto::decrypt(&ciphertext)?;
    let mut inflater = BytecodeReader::new(Cursor::new(compressed));

    let manifest_len = varint::read_u64(&mut inflater)? as usize;
    let mut manifest = vec![0u8; manifest_len];
    inflater.read_exact(&mut manifest)?;

    let property_count = varint::read_u64(&mut inflater)?;
    let mut properties = Vec::with_capacity(property_count as usize);
    for _ in 0..property_count {
        properties.push(varint::read_u64(&mut inflater)?);
    }

    let mut timestamp_buf = [0u8; 8];
    inflater.read_exact(&mut timestamp_buf)?;
    let build_timestamp = u64::from_le_bytes(timestamp_buf);

    // From here on, offsets a caller reports in error messages should read as
    // "N bytes into the bytecode", not "N bytes into the whole plaintext".
    inflater.reset_cursor();
    let mut bytecode = Vec::new();
    inflater.read_to_end(&mut bytecode)?;

    Ok(LoadedPayload { manifest, properties, build_timestamp, bytecode, embeds })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_full_payload() {
        let payload = Payload {
            manifest: b"plugin-manifest-bytes".to_vec(),
            properties: vec![1, 2, 3, 400_000],
            build_timestamp: 1_700_000_000,
            bytecode: b"compiled script bytecode goes here, repeated for compressibility ".repeat(4),
            embedded_packs: vec![("assets".to_string(), b"pack-bytes".to_vec())],
        };

        let mut buf = Vec::new();
        write_trailer(&mut buf, &payload).unwrap();

        let mut cursor = Cursor::new(buf);
        let loaded = read_trailer(&mut cursor).unwrap();
        assert_eq!(loaded.manifest, payload.manifest);
        assert_eq!(loaded.properties, payload.properties);
        assert_eq!(loaded.build_timestamp, payload.build_timestamp);
        assert_eq!(loaded.bytecode, payload.bytecode);
        assert_eq!(loaded.embeds.len(), 1);
        assert_eq!(loaded.embeds[0].name, "assets");
    }

    #[test]
    fn empty_payload_round_trips() {
        let payload = Payload {
            manifest: Vec::new(),
            properties: Vec::new(),
            build_timestamp: 0,
            bytecode: Vec::new(),
            embedded_packs: Vec::new(),
        };
        let mut buf = Vec::new();
        write_trailer(&mut buf, &payload).unwrap();
        let mut cursor = Cursor::new(buf);
        let loaded = read_trailer(&mut cursor).unwrap();
        assert!(loaded.bytecode.is_empty());
        assert!(loaded.embeds.is_empty());
    }
}
