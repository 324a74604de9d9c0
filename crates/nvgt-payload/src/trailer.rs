//! Locates where the payload begins inside a compiled host binary. Windows
//! carries no trailer at all — the loader walks PE section headers and takes
//! the highest `PointerToRawData + SizeOfRawData` as the payload start, since
//! the linker leaves no gap between the last section and appended data. Every
//! other platform just appends a 4-byte little-endian offset at EOF.

use std::io::{Read, Seek, SeekFrom};

use crate::error::{PayloadError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Other,
}

pub fn discover_payload_start<F: Read + Seek>(file: &mut F, platform: Platform) -> Result<u64> {
    match platform {
        Platform::Windows => discover_via_pe_sections(file),
        Platform::Other => discover_via_trailer(file),
    }
}

fn discover_via_trailer<F: Read + Seek>(file: &mut F) -> Result<u64> {
    file.seek(SeekFrom::End(-4))?;
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf) as u64)
}

fn discover_via_pe_sections<F: Read + Seek>(file: &mut F) -> Result<u64> {
    file.seek(SeekFrom::Start(60))?;
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    let pe_header_offset = u32::from_le_bytes(buf) as u64;

    file.seek(SeekFrom::Start(pe_header_offset))?;
    let mut signature = [0u8; 4];
    file.read_exact(&mut signature)?;
    if &signature != b"PE\0\0" {
        return Err(PayloadError::Format("missing PE signature".into()));
    }

    let mut coff_header = [0u8; 20];
    file.read_exact(&mut coff_header)?;
    let number_of_sections = u16::from_le_bytes([coff_header[2], coff_header[3]]) as usize;
    let size_of_optional_header = u16::from_le_bytes([coff_header[16], coff_header[17]]) as i64;
    file.seek(SeekFrom::Current(size_of_optional_header))?;

    let mut max_end = 0u64;
    for _ in 0..number_of_sections {
        let mut section = [0u8; 40];
        file.read_exact(&mut section)?;
        let size_of_raw_data = u32::from_le_bytes([section[16], section[17], section[18], section[19]]) as u64;
        let pointer_to_raw_data = u32::from_le_bytes([section[20], section[21], section[22], section[23]]) as u64;
        max_end = max_end.max(pointer_to_raw_data + size_of_raw_data);
    }
    Ok(max_end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn trailer_form_reads_trailing_le_u32() {
        let mut buf = vec![0xAAu8; 100];
        buf.extend_from_slice(&500u32.to_le_bytes());
        let mut cursor = Cursor::new(buf);
        assert_eq!(discover_payload_start(&mut cursor, Platform::Other).unwrap(), 500);
    }

    fn fake_pe_with_one_section(pointer_to_raw_data: u32, size_of_raw_data: u32) -> Vec<u8> {
        let mut buf = vec![0u8; 64];
        let pe_offset: u32 = 64;
        buf[60..64].copy_from_slice(&pe_offset.to_le_bytes());
        buf.extend_from_slice(b"PE\0\0");

        let mut coff = [0u8; 20];
        coff[2..4].copy_from_slice(&1u16.to_le_bytes()); // NumberOfSections
        let size_of_optional_header: u16 = 224;
        coff[16..18].copy_from_slice(&size_of_optional_header.to_le_bytes());
        buf.extend_from_slice(&coff);
        buf.extend_from_slice(&vec![0u8; size_of_optional_header as usize]);

        let mut section = [0u8; 40];
        section[16..20].copy_from_slice(&size_of_raw_data.to_le_bytes());
        section[20..24].copy_from_slice(&pointer_to_raw_data.to_le_bytes());
        buf.extend_from_slice(&section);
        buf
    }

    #[test]
    fn pe_form_takes_the_max_section_end() {
        let bytes = fake_pe_with_one_section(1024, 4096);
        let mut cursor = Cursor::new(bytes);
        assert_eq!(discover_payload_start(&mut cursor, Platform::Windows).unwrap(), 5120);
    }

    #[test]
    fn pe_form_rejects_bad_signature() {
        let mut bytes = fake_pe_with_one_section(1024, 4096);
        let pe_offset = 64usize;
        bytes[pe_offset..pe_offset + 4].copy_from_slice(b"NOPE");
        let mut cursor = Cursor::new(bytes);
        assert!(discover_payload_start(&mut cursor, Platform::Windows).is_err());
    }
}
