//! Builds small but complete archives in memory.
//!
//! Layout of the fixture, under `fighter/mario`:
//!
//! | file | name           | content                                   |
//! |------|----------------|-------------------------------------------|
//! | 0    | model.numdlb   | stored                                    |
//! | 1    | body.nutexb    | zstd                                      |
//! | 2    | alias.numdlb   | link to file 0                            |
//! | 3    | shared.bin     | redirect into the second directory offset |
//! | 4    | empty.bin      | zero length                               |
//! | 5, 6 | loop_a/b.bin   | links to each other                       |
//! | 7    | zz.bin         | corrupt zstd block                        |
#![allow(dead_code)]

use std::io::Cursor;

use arc_format::comde::{zstd::ZstdCompressor, Compressor};
use arc_format::HashKey;
use byteorder::{LittleEndian, WriteBytesExt};

pub const DATA_OFFSET: u64 = 0x40;
pub const MAGIC: u64 = 0xABCD_EF98_7654_3210;

pub const LINK: u32 = 1 << 20;
pub const OFFSET_ZSTD: u8 = 0b11;
pub const OFFSET_REDIRECT: u8 = 1 << 3;
pub const ENTRY_DIRECTORY: u32 = 0x40_0000;
pub const NONE: u32 = 0xFF_FFFF;

pub const MODEL: &[u8] = b"mario model data";
pub const REDIRECTED: &[u8] = b"shared redirect!";
pub const STREAM: &[u8] = b"OPUS stream data";
pub const JUNK: &[u8] = &[0x55; 16];

pub const PARENT: &str = "fighter/mario/";
pub const STREAM_NAME: &str = "stream:/sound/bgm/title.nus3audio";

/// `(path, name, extension, flags)` of every file, by index.
pub const FILES: [(&str, &str, &str, u32); 8] = [
    ("fighter/mario/model.numdlb", "model.numdlb", "numdlb", 0),
    ("fighter/mario/body.nutexb", "body.nutexb", "nutexb", 0),
    ("fighter/mario/alias.numdlb", "alias.numdlb", "numdlb", LINK),
    ("fighter/mario/shared.bin", "shared.bin", "bin", 0),
    ("fighter/mario/empty.bin", "empty.bin", "bin", 0),
    ("fighter/mario/loop_a.bin", "loop_a.bin", "bin", LINK),
    ("fighter/mario/loop_b.bin", "loop_b.bin", "bin", LINK),
    ("fighter/mario/zz.bin", "zz.bin", "bin", 0),
];

pub fn texture() -> Vec<u8> {
    b"texture bytes, ".repeat(32)
}

pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    ZstdCompressor
        .compress(&mut out, &mut Cursor::new(data))
        .unwrap();
    out.into_inner()
}

fn hash(w: &mut Vec<u8>, text: &str) {
    let key = HashKey::of(text);
    w.write_u32::<LittleEndian>(key.crc()).unwrap();
    w.write_u8(key.len()).unwrap();
}

fn int24(w: &mut Vec<u8>, value: u32) {
    w.extend_from_slice(&value.to_le_bytes()[..3]);
}

fn pad3(w: &mut Vec<u8>) {
    w.extend_from_slice(&[0; 3]);
}

fn u32(w: &mut Vec<u8>, value: u32) {
    w.write_u32::<LittleEndian>(value).unwrap();
}

fn i32(w: &mut Vec<u8>, value: i32) {
    w.write_i32::<LittleEndian>(value).unwrap();
}

fn u64(w: &mut Vec<u8>, value: u64) {
    w.write_u64::<LittleEndian>(value).unwrap();
}

/// Appends `bytes` at a 4-byte boundary and returns its position in 4-byte
/// units.
fn push_aligned(data: &mut Vec<u8>, bytes: &[u8]) -> u32 {
    while data.len() % 4 != 0 {
        data.push(0);
    }
    let at = data.len() as u32 / 4;
    data.extend_from_slice(bytes);
    at
}

/// Positions of the pieces of the data region.
struct Data {
    bytes: Vec<u8>,
    model: u32,
    body: u32,
    body_packed: u32,
    junk: u32,
    redirected: u32,
    stream: u32,
}

fn data_region() -> Data {
    let mut bytes = Vec::new();
    let packed = compress(&texture());

    let model = push_aligned(&mut bytes, MODEL);
    let body = push_aligned(&mut bytes, &packed);
    let junk = push_aligned(&mut bytes, JUNK);
    let redirected = push_aligned(&mut bytes, REDIRECTED);
    let stream = push_aligned(&mut bytes, STREAM);
    push_aligned(&mut bytes, &[]);

    Data {
        bytes,
        model,
        body,
        body_packed: packed.len() as u32,
        junk,
        redirected,
        stream,
    }
}

fn file_offset(w: &mut Vec<u8>, offset: u32, compressed: u32, size: u32, link: u32, flags: u8) {
    u32(w, offset);
    u32(w, compressed);
    u32(w, size);
    int24(w, link);
    w.write_u8(flags).unwrap();
}

fn primary_table(data: &Data) -> Vec<u8> {
    let mut t = Vec::new();
    let file_count = FILES.len() as i32;

    // Header.
    i32(&mut t, 0);
    i32(&mut t, 1); // directories
    i32(&mut t, 1); // directory offset base
    i32(&mut t, file_count);
    i32(&mut t, file_count); // file offset base
    i32(&mut t, file_count); // file lookups
    i32(&mut t, 0); // directory hashes
    i32(&mut t, 0);
    i32(&mut t, 1); // redirect directory offsets
    i32(&mut t, 1); // redirect file offsets
    i32(&mut t, 0);
    i32(&mut t, 0);
    t.write_u8(0).unwrap(); // root hashes
    t.write_u8(0).unwrap();
    t.write_i16::<LittleEndian>(0).unwrap();
    i32(&mut t, 0); // stream folders
    i32(&mut t, 1); // stream names
    i32(&mut t, 1); // stream entities
    i32(&mut t, 1); // stream files
    assert_eq!(t.len(), 0x44);

    // Stream hashes, names, entities and files.
    hash(&mut t, STREAM_NAME);
    int24(&mut t, 0);
    hash(&mut t, STREAM_NAME);
    int24(&mut t, 0);
    u32(&mut t, 0);
    u32(&mut t, 0);
    u64(&mut t, STREAM.len() as u64);
    u64(&mut t, DATA_OFFSET + data.stream as u64 * 4);

    // Directory.
    hash(&mut t, "fighter/mario");
    int24(&mut t, 0);
    hash(&mut t, "mario");
    pad3(&mut t);
    hash(&mut t, "fighter");
    pad3(&mut t);
    hash(&mut t, "");
    pad3(&mut t);
    u32(&mut t, 0);
    u32(&mut t, file_count as u32);
    u32(&mut t, 0);
    t.write_u16::<LittleEndian>(0).unwrap();
    t.write_u16::<LittleEndian>(0).unwrap();
    u32(&mut t, 0);

    // Directory offsets: the directory's block, then the redirect region.
    u64(&mut t, 0);
    u32(&mut t, data.bytes.len() as u32);
    u32(&mut t, data.bytes.len() as u32);
    u32(&mut t, 0);
    u32(&mut t, file_count as u32);
    u32(&mut t, NONE);

    u64(&mut t, data.redirected as u64 * 4);
    u32(&mut t, REDIRECTED.len() as u32);
    u32(&mut t, REDIRECTED.len() as u32);
    u32(&mut t, 0);
    u32(&mut t, 1);
    u32(&mut t, NONE);

    // Files.
    for (index, (path, name, ext, flags)) in FILES.iter().enumerate() {
        hash(&mut t, path);
        int24(&mut t, 0);
        hash(&mut t, ext);
        int24(&mut t, 0);
        hash(&mut t, PARENT);
        pad3(&mut t);
        hash(&mut t, name);
        pad3(&mut t);
        u32(&mut t, index as u32);
        u32(&mut t, *flags);
    }

    // File offsets.
    let model = MODEL.len() as u32;
    let texture = texture().len() as u32;
    file_offset(&mut t, data.model, model, model, 0, 0);
    file_offset(&mut t, data.body, data.body_packed, texture, 1, OFFSET_ZSTD);
    file_offset(&mut t, 0, 0, 0, 0, 0);
    file_offset(&mut t, 0, 0, 0, 0, OFFSET_REDIRECT);
    file_offset(&mut t, 0, 0, 0, 4, 0);
    file_offset(&mut t, 0, 0, 0, 6, 0);
    file_offset(&mut t, 0, 0, 0, 5, 0);
    file_offset(&mut t, data.junk, JUNK.len() as u32, 64, 7, OFFSET_ZSTD);
    let redirected = REDIRECTED.len() as u32;
    file_offset(&mut t, 0, redirected, redirected, NONE, 0);

    // Directory lookups.
    hash(&mut t, "fighter/mario");
    int24(&mut t, 0);

    // No file groups.
    u32(&mut t, 0);
    i32(&mut t, 0);

    // File lookups, then per-file extras.
    for (index, (path, ..)) in FILES.iter().enumerate() {
        hash(&mut t, path);
        int24(&mut t, index as u32);
    }
    t.extend(std::iter::repeat(0).take(FILES.len() * 8));

    t
}

fn hierarchy_directory(t: &mut Vec<u8>, path: &str, parent: &str, name: &str, start: u32, count: u32) {
    hash(t, path);
    int24(t, 0);
    hash(t, parent);
    int24(t, count);
    hash(t, name);
    pad3(t);
    u32(t, start);
    u32(t, count);
}

fn hierarchy_entry(
    t: &mut Vec<u8>,
    path: &str,
    next: u32,
    parent: &str,
    kind: u32,
    name: &str,
    ext: &str,
) {
    hash(t, path);
    int24(t, next);
    hash(t, parent);
    int24(t, kind);
    hash(t, name);
    pad3(t);
    hash(t, ext);
    pad3(t);
}

/// `/` -> `fighter` -> `fighter/mario` -> { model.numdlb, body.nutexb }
fn secondary_table() -> Vec<u8> {
    let directories = [
        ("/", "", "", 0, 1),
        ("fighter", "/", "fighter", 1, 1),
        ("fighter/mario", "fighter", "mario", 2, 2),
    ];
    let entries = [
        ("fighter", NONE, "/", ENTRY_DIRECTORY, "fighter", ""),
        ("fighter/mario", NONE, "fighter", ENTRY_DIRECTORY, "mario", ""),
        (FILES[0].0, 3, "fighter/mario", 0, FILES[0].1, FILES[0].2),
        (FILES[1].0, NONE, "fighter/mario", 0, FILES[1].1, FILES[1].2),
    ];

    let mut t = Vec::new();
    i32(&mut t, 0);
    i32(&mut t, 0);
    i32(&mut t, directories.len() as i32);
    i32(&mut t, 0);
    i32(&mut t, entries.len() as i32);

    for (index, (path, ..)) in directories.iter().enumerate() {
        hash(&mut t, path);
        int24(&mut t, index as u32);
    }
    for (path, parent, name, start, count) in directories {
        hierarchy_directory(&mut t, path, parent, name, start, count);
    }
    for (index, (path, ..)) in entries.iter().enumerate() {
        hash(&mut t, path);
        int24(&mut t, index as u32);
    }
    for (path, next, parent, kind, name, ext) in entries {
        hierarchy_entry(&mut t, path, next, parent, kind, name, ext);
    }

    t
}

/// Stored tables begin with their own length, which must clear the
/// compressed-table threshold.
fn stored(mut table: Vec<u8>) -> Vec<u8> {
    if table.len() < 0x100 {
        table.resize(0x100, 0);
    }
    let len = table.len() as i32;
    table[..4].copy_from_slice(&len.to_le_bytes());
    table
}

fn compressed(table: Vec<u8>) -> Vec<u8> {
    let table = stored(table);
    let packed = compress(&table);

    let mut out = Vec::new();
    u32(&mut out, 0x10);
    u32(&mut out, table.len() as u32);
    u32(&mut out, packed.len() as u32);
    u32(&mut out, packed.len() as u32 + 0x10);
    out.extend_from_slice(&packed);
    out
}

/// Header, data region, primary table, secondary table.
pub fn build_archive(compressed_tables: bool) -> Vec<u8> {
    let data = data_region();
    let (primary, secondary) = if compressed_tables {
        (compressed(primary_table(&data)), compressed(secondary_table()))
    } else {
        (stored(primary_table(&data)), stored(secondary_table()))
    };

    let primary_offset = DATA_OFFSET + data.bytes.len() as u64;
    let secondary_offset = primary_offset + primary.len() as u64;
    let total = secondary_offset + secondary.len() as u64;

    let mut out = Vec::with_capacity(total as usize);
    u64(&mut out, MAGIC);
    u64(&mut out, total);
    u64(&mut out, DATA_OFFSET);
    u64(&mut out, secondary.len() as u64);
    u64(&mut out, primary_offset);
    u64(&mut out, secondary_offset);
    u64(&mut out, 0);
    out.resize(DATA_OFFSET as usize, 0);

    out.extend_from_slice(&data.bytes);
    out.extend_from_slice(&primary);
    out.extend_from_slice(&secondary);
    out
}

/// Byte position of the redirected content.
pub fn redirected_offset() -> u64 {
    DATA_OFFSET + data_region().redirected as u64 * 4
}

/// Every string the fixture was built from.
pub fn all_strings() -> Vec<&'static str> {
    let mut out = vec!["/", "fighter", "mario", "fighter/mario", PARENT, STREAM_NAME];
    for (path, name, ext, _) in FILES.iter() {
        out.extend([*path, *name, *ext]);
    }
    out
}
