use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::de::DeserializeOwned;

/// Metadata tables whose first word is below this are stored compressed; an
/// uncompressed table starts with its own total length, which is always larger.
pub(crate) const COMPRESSED_TABLE_THRESHOLD: i32 = 0x100;

/// The fixed archive header at offset zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub magic: u64,
    pub size: u64,
    /// Base of the data region every directory offset is relative to.
    pub data_offset: u64,
    pub secondary_size: u64,
    /// Absolute offset of the primary (file/offset) table.
    pub primary_table_offset: u64,
    /// Absolute offset of the secondary (hierarchy) table.
    pub secondary_table_offset: u64,
    pub tail_size: u64,
}

impl DeserializeOwned for ArchiveHeader {
    const SIZE: u64 = 0x38;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let magic = reader.read_u64::<LittleEndian>()?;
        let size = reader.read_u64::<LittleEndian>()?;
        let data_offset = reader.read_u64::<LittleEndian>()?;
        let secondary_size = reader.read_u64::<LittleEndian>()?;
        let primary_table_offset = reader.read_u64::<LittleEndian>()?;
        let secondary_table_offset = reader.read_u64::<LittleEndian>()?;
        let tail_size = reader.read_u64::<LittleEndian>()?;

        tracing::debug!(
            magic = format_args!("{:#018x}", magic),
            data_offset = format_args!("{:#x}", data_offset),
            primary_table_offset = format_args!("{:#x}", primary_table_offset),
            secondary_table_offset = format_args!("{:#x}", secondary_table_offset),
            "deserialized ArchiveHeader"
        );

        Ok(ArchiveHeader {
            magic,
            size,
            data_offset,
            secondary_size,
            primary_table_offset,
            secondary_table_offset,
            tail_size,
        })
    }
}

/// Sub-header in front of a zstd-compressed metadata table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressedTableHeader {
    /// Start of the compressed payload, relative to the sub-header.
    pub data_offset: u32,
    pub size: u32,
    pub compressed_size: u32,
    pub total_compressed_size: u32,
}

impl DeserializeOwned for CompressedTableHeader {
    const SIZE: u64 = 0x10;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(CompressedTableHeader {
            data_offset: reader.read_u32::<LittleEndian>()?,
            size: reader.read_u32::<LittleEndian>()?,
            compressed_size: reader.read_u32::<LittleEndian>()?,
            total_compressed_size: reader.read_u32::<LittleEndian>()?,
        })
    }
}
