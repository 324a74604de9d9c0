//! End-to-end: build a pack, embed it in a payload trailer alongside
//! encrypted/compressed bytecode, append it to a fake host stub, then
//! rediscover and reload everything back out.

use std::io::{Cursor, Read, Seek, SeekFrom};

use nvgt_core::{discover_payload_start, read_trailer, write_trailer, Pack, Payload, Platform};

fn build_pack_bytes(dir: &tempfile::TempDir) -> Vec<u8> {
    let path = dir.path().join("assets.pack");
    let mut pack = Pack::new();
    pack.create(&path, "").unwrap();
    pack.add_memory("greeting.txt", b"hello from the embedded pack").unwrap();
    pack.close().unwrap();
    std::fs::read(&path).unwrap()
}

#[test]
fn embedded_pack_survives_a_full_stub_plus_trailer_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let pack_bytes = build_pack_bytes(&dir);

    let payload = Payload {
        manifest: b"no plugins".to_vec(),
        properties: vec![44_100, 2],
        build_timestamp: 1_753_600_000,
        bytecode: b"fn main() { }".repeat(8),
        embedded_packs: vec![("assets".to_string(), pack_bytes.clone())],
    };

    // Simulate a platform stub binary: arbitrary leading bytes, then the
    // trailer, then (non-Windows) a 4-byte little-endian start offset.
    let mut stub = vec![0xABu8; 256];
    let trailer_start = stub.len() as u32;
    let mut trailer = Vec::new();
    write_trailer(&mut trailer, &payload).unwrap();
    stub.extend_from_slice(&trailer);
    stub.extend_from_slice(&trailer_start.to_le_bytes());

    let mut file = Cursor::new(stub);
    let start = discover_payload_start(&mut file, Platform::Other).unwrap();
    assert_eq!(start, trailer_start as u64);

    file.seek(SeekFrom::Start(start)).unwrap();
    let loaded = read_trailer(&mut file).unwrap();

    assert_eq!(loaded.manifest, payload.manifest);
    assert_eq!(loaded.properties, payload.properties);
    assert_eq!(loaded.bytecode, payload.bytecode);
    assert_eq!(loaded.embeds.len(), 1);
    assert_eq!(loaded.embeds[0].name, "assets");

    // The embed's recorded (offset, size) is an absolute position in the host
    // file; slice it back out of the original bytes and confirm it's the
    // same pack.
    let embed = &loaded.embeds[0];
    let whole = file.get_ref();
    let pack_slice = &whole[embed.offset as usize..(embed.offset + embed.size) as usize];
    assert_eq!(pack_slice, pack_bytes.as_slice());

    let mut reopened = Pack::new();
    let tmp = dir.path().join("sliced.pack");
    std::fs::write(&tmp, pack_slice).unwrap();
    reopened.open(&tmp, "", 0, 0).unwrap();
    let mut buf = Vec::new();
    reopened.get_file("greeting.txt").unwrap().read_to_end(&mut buf).unwrap();
    assert_eq!(buf, b"hello from the embedded pack");
}

#[test]
fn pe_form_discovers_the_trailer_without_a_trailing_offset() {
    // A minimal one-section PE stub whose section data ends exactly where the
    // trailer begins, mirroring the Windows loader's section-walk approach.
    let mut stub = vec![0u8; 64];
    let pe_offset: u32 = 64;
    stub[60..64].copy_from_slice(&pe_offset.to_le_bytes());
    stub.extend_from_slice(b"PE\0\0");

    let mut coff = [0u8; 20];
    coff[2..4].copy_from_slice(&1u16.to_le_bytes());
    let optional_header_len: u16 = 0;
    coff[16..18].copy_from_slice(&optional_header_len.to_le_bytes());
    stub.extend_from_slice(&coff);

    let section_table_end = stub.len() + 40;
    let payload_start = section_table_end as u32;

    let mut section = [0u8; 40];
    section[16..20].copy_from_slice(&64u32.to_le_bytes()); // SizeOfRawData
    section[20..24].copy_from_slice(&(payload_start - 64).to_le_bytes()); // PointerToRawData
    stub.extend_from_slice(&section);

    let mut file = Cursor::new(stub);
    let start = discover_payload_start(&mut file, Platform::Windows).unwrap();
    assert_eq!(start, payload_start as u64);
}
