//! Embedded-pack block framing: a varint count followed by, per pack, a
//! length-prefixed name, a 4-byte little-endian size, and the raw pack bytes.
//! Resolution implements the `*`/`*name` selector syntax used at pack-open
//! time: `*` alone picks the first embed, `*name` picks the named one.

use std::io::{Read, Seek, SeekFrom, Write};

use nvgt_pack::varint;

use crate::error::{PayloadError, Result};

#[derive(Debug, Clone)]
pub struct EmbeddedPackEntry {
    pub name: String,
    pub offset: u64,
    pub size: u64,
}

pub fn write_embedded_packs<W: Write>(w: &mut W, packs: &[(String, Vec<u8>)]) -> Result<()> {
    varint::write_u64(w, packs.len() as u64)?;
    for (name, bytes) in packs {
        varint::write_u64(w, name.len() as u64)?;
        w.write_all(name.as_bytes())?;
        w.write_all(&(bytes.len() as u32).to_le_bytes())?;
        w.write_all(bytes)?;
    }
    Ok(())
}

/// Parses the embedded-pack block, recording each entry's byte range without
/// copying pack contents into memory. `r` is left positioned just past the
/// block, ready to read the bytecode-length varint that follows.
pub fn read_embedded_packs<R: Read + Seek>(r: &mut R) -> Result<Vec<EmbeddedPackEntry>> {
    let count = varint::read_u64(r)?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_len = varint::read_u64(r)? as usize;
        let mut name_bytes = vec![0u8; name_len];
        r.read_exact(&mut name_bytes)?;
        let name = String::from_utf8(name_bytes).map_err(|_| PayloadError::Format("embed name is not valid utf-8".into()))?;
        let mut size_buf = [0u8; 4];
        r.read_exact(&mut size_buf)?;
        let size = u32::from_le_bytes(size_buf) as u64;
        let offset = r.stream_position()?;
        r.seek(SeekFrom::Current(size as i64))?;
        entries.push(EmbeddedPackEntry { name, offset, size });
    }
    Ok(entries)
}

/// Resolves a pack-open selector (`"*"`, `"*name"`, or a plain path) against
/// the in-process embed map. Returns `None` for a plain filesystem path
/// (the caller should fall through to opening it directly).
pub fn resolve_embed<'a>(selector: &str, embeds: &'a [EmbeddedPackEntry]) -> Option<Option<&'a EmbeddedPackEntry>> {
    let name = selector.strip_prefix('*')?;
    if name.is_empty() {
        Some(embeds.first())
    } else {
        Some(embeds.iter().find(|e| e.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_multiple_embeds() {
        let packs = vec![("assets".to_string(), b"one".to_vec()), ("voices".to_string(), b"twotwo".to_vec())];
        let mut buf = Vec::new();
        write_embedded_packs(&mut buf, &packs).unwrap();
        buf.extend_from_slice(b"trailing bytecode marker");

        let mut cursor = Cursor::new(buf);
        let entries = read_embedded_packs(&mut cursor).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "assets");
        assert_eq!(entries[0].size, 3);
        assert_eq!(entries[1].name, "voices");
        assert_eq!(entries[1].size, 6);
    }

    #[test]
    fn star_alone_picks_first_and_star_name_picks_named() {
        let entries = vec![
            EmbeddedPackEntry { name: "assets".into(), offset: 0, size: 10 },
            EmbeddedPackEntry { name: "voices".into(), offset: 10, size: 20 },
        ];
        assert_eq!(resolve_embed("*", &entries).unwrap().unwrap().name, "assets");
        assert_eq!(resolve_embed("*voices", &entries).unwrap().unwrap().name, "voices");
        assert!(resolve_embed("plain/path.pack", &entries).is_none());
        assert!(resolve_embed("*missing", &entries).unwrap().is_none());
    }
}
