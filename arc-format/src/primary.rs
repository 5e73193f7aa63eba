//! The primary metadata table: directories, files, their physical offsets and
//! the stream (raw media) index.
//!
//! Records reference each other by array position. Every array is decoded
//! first and [`PrimaryTable::link`] resolves the indices afterwards, since a
//! record can point into an array that is stored after it.

use std::collections::HashSet;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::de::{
    checked_count, read_array, read_count, skip_padding, DeserializeOwned, TableReader,
};
use crate::error::FormatError;
use crate::hash::{HashKey, Int24};

bitflags::bitflags! {
    /// Behaviour flags of a [`FileRecord`].
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct FileFlags: u32 {
        const UNKNOWN_1 = 1 << 1;
        const UNKNOWN_9 = 1 << 9;
        const UNKNOWN_17 = 1 << 17;
        /// The record shares the content of another file record.
        const LINK = 1 << 20;
        const UNKNOWN_21 = 1 << 21;
    }

    /// Storage flags of a [`FileOffset`].
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct OffsetFlags: u8 {
        const ZSTD = 1 << 0;
        const COMPRESSED = 1 << 1;
        /// `link_index` is a content-relative alias, not a file index.
        const REDIRECT = 1 << 3;
        const UNKNOWN_4 = 1 << 4;
        const UNKNOWN_5 = 1 << 5;
        const UNKNOWN_6 = 1 << 6;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrimaryHeader {
    pub length: i32,
    pub directory_count: i32,
    /// Number of directory offsets before the redirect-target region.
    pub directory_offset_base: i32,
    pub file_count: i32,
    /// Number of file offsets before the redirect-target region.
    pub file_offset_base: i32,
    pub file_lookup_count: i32,
    pub directory_hash_count: i32,
    pub unknown_1c: i32,
    pub directory_offset_count: i32,
    pub file_offset_count: i32,
    pub unknown_28: i32,
    pub unknown_2c: i32,
    pub root_hash_count: u8,
    pub unknown_31: u8,
    pub unknown_32: i16,
    pub stream_folder_count: i32,
    pub stream_name_count: i32,
    pub stream_entity_count: i32,
    pub stream_file_count: i32,
}

impl DeserializeOwned for PrimaryHeader {
    const SIZE: u64 = 0x44;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(PrimaryHeader {
            length: reader.read_i32::<LittleEndian>()?,
            directory_count: reader.read_i32::<LittleEndian>()?,
            directory_offset_base: reader.read_i32::<LittleEndian>()?,
            file_count: reader.read_i32::<LittleEndian>()?,
            file_offset_base: reader.read_i32::<LittleEndian>()?,
            file_lookup_count: reader.read_i32::<LittleEndian>()?,
            directory_hash_count: reader.read_i32::<LittleEndian>()?,
            unknown_1c: reader.read_i32::<LittleEndian>()?,
            directory_offset_count: reader.read_i32::<LittleEndian>()?,
            file_offset_count: reader.read_i32::<LittleEndian>()?,
            unknown_28: reader.read_i32::<LittleEndian>()?,
            unknown_2c: reader.read_i32::<LittleEndian>()?,
            root_hash_count: reader.read_u8()?,
            unknown_31: reader.read_u8()?,
            unknown_32: reader.read_i16::<LittleEndian>()?,
            stream_folder_count: reader.read_i32::<LittleEndian>()?,
            stream_name_count: reader.read_i32::<LittleEndian>()?,
            stream_entity_count: reader.read_i32::<LittleEndian>()?,
            stream_file_count: reader.read_i32::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamFolder {
    pub name: HashKey,
    pub child_count: Int24,
    pub child_start: u32,
}

impl DeserializeOwned for StreamFolder {
    const SIZE: u64 = 12;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(StreamFolder {
            name: HashKey::deserialize_owned(reader)?,
            child_count: Int24::deserialize_owned(reader)?,
            child_start: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Stream checksum to name slot.
#[derive(Debug, Clone, Default)]
pub struct StreamHashEntry {
    pub hash: HashKey,
    pub name_index: Int24,
}

impl DeserializeOwned for StreamHashEntry {
    const SIZE: u64 = 8;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(StreamHashEntry {
            hash: HashKey::deserialize_owned(reader)?,
            name_index: Int24::deserialize_owned(reader)?,
        })
    }
}

/// Name slot to stream entity.
#[derive(Debug, Clone, Default)]
pub struct StreamName {
    pub hash: HashKey,
    pub stream_index: Int24,
    pub flags: u32,
}

impl DeserializeOwned for StreamName {
    const SIZE: u64 = 12;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(StreamName {
            hash: HashKey::deserialize_owned(reader)?,
            stream_index: Int24::deserialize_owned(reader)?,
            flags: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Stream entity to stream file.
#[derive(Debug, Clone, Default)]
pub struct StreamEntity {
    pub file_index: u32,
}

impl DeserializeOwned for StreamEntity {
    const SIZE: u64 = 4;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(StreamEntity {
            file_index: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Absolute location of raw stream data.
#[derive(Debug, Clone, Default)]
pub struct StreamFile {
    pub size: u64,
    pub offset: u64,
}

impl DeserializeOwned for StreamFile {
    const SIZE: u64 = 16;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(StreamFile {
            size: reader.read_u64::<LittleEndian>()?,
            offset: reader.read_u64::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RootHash {
    pub unknown_0: u32,
    pub hash: HashKey,
    pub index: Int24,
}

impl DeserializeOwned for RootHash {
    const SIZE: u64 = 12;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(RootHash {
            unknown_0: reader.read_u32::<LittleEndian>()?,
            hash: HashKey::deserialize_owned(reader)?,
            index: Int24::deserialize_owned(reader)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryRecord {
    pub path: HashKey,
    pub offset_index: Int24,
    pub name: HashKey,
    pub parent: HashKey,
    pub lifetime: HashKey,
    pub first_file_index: u32,
    pub file_count: u32,
    pub child_start: u32,
    pub child_count: u16,
    pub unknown_2e: u16,
    pub flags: u32,
}

impl DeserializeOwned for DirectoryRecord {
    const SIZE: u64 = 52;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let path = HashKey::deserialize_owned(reader)?;
        let offset_index = Int24::deserialize_owned(reader)?;
        let name = HashKey::deserialize_owned(reader)?;
        skip_padding(reader)?;
        let parent = HashKey::deserialize_owned(reader)?;
        skip_padding(reader)?;
        let lifetime = HashKey::deserialize_owned(reader)?;
        skip_padding(reader)?;

        Ok(DirectoryRecord {
            path,
            offset_index,
            name,
            parent,
            lifetime,
            first_file_index: reader.read_u32::<LittleEndian>()?,
            file_count: reader.read_u32::<LittleEndian>()?,
            child_start: reader.read_u32::<LittleEndian>()?,
            child_count: reader.read_u16::<LittleEndian>()?,
            unknown_2e: reader.read_u16::<LittleEndian>()?,
            flags: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Physical placement of one directory's data block.
#[derive(Debug, Clone, Default)]
pub struct DirectoryOffset {
    pub offset: u64,
    pub size: u32,
    pub compressed_size: u32,
    pub first_file_index: u32,
    pub file_count: u32,
    /// Index of a related directory offset, or `0xFFFFFF`.
    pub link_index: u32,
}

impl DirectoryOffset {
    /// Whether `index` falls in `[first_file_index, first_file_index + file_count)`.
    #[inline]
    pub fn owns(&self, index: usize) -> bool {
        let first = self.first_file_index as usize;
        index >= first && index < first + self.file_count as usize
    }
}

impl DeserializeOwned for DirectoryOffset {
    const SIZE: u64 = 28;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(DirectoryOffset {
            offset: reader.read_u64::<LittleEndian>()?,
            size: reader.read_u32::<LittleEndian>()?,
            compressed_size: reader.read_u32::<LittleEndian>()?,
            first_file_index: reader.read_u32::<LittleEndian>()?,
            file_count: reader.read_u32::<LittleEndian>()?,
            link_index: reader.read_u32::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryHash {
    pub hash: HashKey,
    pub index: Int24,
}

impl DeserializeOwned for DirectoryHash {
    const SIZE: u64 = 8;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(DirectoryHash {
            hash: HashKey::deserialize_owned(reader)?,
            index: Int24::deserialize_owned(reader)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileRecord {
    pub path: HashKey,
    pub directory_index: Int24,
    pub extension: HashKey,
    pub version: Int24,
    /// Parent directory text, including its trailing `/`.
    pub parent: HashKey,
    pub name: HashKey,
    pub offset_index: u32,
    pub flags: FileFlags,
}

impl FileRecord {
    #[inline(always)]
    pub fn is_link(&self) -> bool {
        self.flags.contains(FileFlags::LINK)
    }
}

impl DeserializeOwned for FileRecord {
    const SIZE: u64 = 40;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let path = HashKey::deserialize_owned(reader)?;
        let directory_index = Int24::deserialize_owned(reader)?;
        let extension = HashKey::deserialize_owned(reader)?;
        let version = Int24::deserialize_owned(reader)?;
        let parent = HashKey::deserialize_owned(reader)?;
        skip_padding(reader)?;
        let name = HashKey::deserialize_owned(reader)?;
        skip_padding(reader)?;

        Ok(FileRecord {
            path,
            directory_index,
            extension,
            version,
            parent,
            name,
            offset_index: reader.read_u32::<LittleEndian>()?,
            flags: FileFlags::from_bits_retain(reader.read_u32::<LittleEndian>()?),
        })
    }
}

/// Placement of one file within its directory's data block.
#[derive(Debug, Clone, Default)]
pub struct FileOffset {
    /// In 4-byte units from the directory offset.
    pub offset: u32,
    pub compressed_size: u32,
    pub size: u32,
    /// Target file for links, or the alias target when redirected.
    pub link_index: Int24,
    pub flags: OffsetFlags,
}

impl FileOffset {
    #[inline(always)]
    pub fn is_redirect(&self) -> bool {
        self.flags.contains(OffsetFlags::REDIRECT)
    }

    #[inline(always)]
    pub fn is_compressed(&self) -> bool {
        self.flags
            .contains(OffsetFlags::ZSTD | OffsetFlags::COMPRESSED)
    }
}

impl DeserializeOwned for FileOffset {
    const SIZE: u64 = 16;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(FileOffset {
            offset: reader.read_u32::<LittleEndian>()?,
            compressed_size: reader.read_u32::<LittleEndian>()?,
            size: reader.read_u32::<LittleEndian>()?,
            link_index: Int24::deserialize_owned(reader)?,
            flags: OffsetFlags::from_bits_retain(reader.read_u8()?),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryLookup {
    pub hash: HashKey,
    pub directory_index: Int24,
}

impl DeserializeOwned for DirectoryLookup {
    const SIZE: u64 = 8;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(DirectoryLookup {
            hash: HashKey::deserialize_owned(reader)?,
            directory_index: Int24::deserialize_owned(reader)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileGroup {
    pub file_index: u32,
    pub count: u32,
}

impl DeserializeOwned for FileGroup {
    const SIZE: u64 = 8;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(FileGroup {
            file_index: reader.read_u32::<LittleEndian>()?,
            count: reader.read_u32::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileLookup {
    pub hash: HashKey,
    pub file_index: Int24,
}

impl DeserializeOwned for FileLookup {
    const SIZE: u64 = 8;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(FileLookup {
            hash: HashKey::deserialize_owned(reader)?,
            file_index: Int24::deserialize_owned(reader)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileExtra {
    pub unknown_0: u32,
    pub unknown_4: u32,
}

impl DeserializeOwned for FileExtra {
    const SIZE: u64 = 8;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(FileExtra {
            unknown_0: reader.read_u32::<LittleEndian>()?,
            unknown_4: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Where a file offset record leads once linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetTarget {
    /// Plain offset; `link_index` names a file record.
    File(usize),
    /// Plain offset whose `link_index` is out of range. Only an error if a
    /// link is actually followed through it.
    Dangling,
    /// Alias to another offset record and the directory offset owning it.
    Redirect {
        offset: usize,
        directory_offset: usize,
    },
    /// Alias whose target has no offset record or no owning directory.
    UnresolvedRedirect,
}

/// Resolved cross-references, parallel to the record arrays.
#[derive(Debug, Default)]
pub(crate) struct PrimaryLinks {
    pub(crate) stream_hash_names: Vec<usize>,
    pub(crate) stream_name_entities: Vec<usize>,
    pub(crate) stream_entity_files: Vec<usize>,
    pub(crate) file_directories: Vec<usize>,
    pub(crate) file_offsets: Vec<usize>,
    pub(crate) file_lookup_files: Vec<usize>,
    pub(crate) directory_lookup_directories: Vec<Option<usize>>,
    pub(crate) directory_offsets: Vec<usize>,
    pub(crate) directory_first_files: Vec<Option<usize>>,
    pub(crate) offset_targets: Vec<OffsetTarget>,
    pub(crate) directory_offset_links: Vec<Option<usize>>,
}

#[derive(Debug, Default)]
pub struct PrimaryTable {
    pub(crate) header: PrimaryHeader,
    pub(crate) stream_folders: Vec<StreamFolder>,
    pub(crate) stream_hashes: Vec<StreamHashEntry>,
    pub(crate) stream_names: Vec<StreamName>,
    pub(crate) stream_entities: Vec<StreamEntity>,
    pub(crate) stream_files: Vec<StreamFile>,
    pub(crate) root_hashes: Vec<RootHash>,
    pub(crate) directories: Vec<DirectoryRecord>,
    pub(crate) directory_offsets: Vec<DirectoryOffset>,
    pub(crate) directory_hashes: Vec<DirectoryHash>,
    pub(crate) files: Vec<FileRecord>,
    pub(crate) file_offsets: Vec<FileOffset>,
    pub(crate) directory_lookups: Vec<DirectoryLookup>,
    pub(crate) grouped_file_count: u32,
    pub(crate) file_groups: Vec<FileGroup>,
    pub(crate) file_lookups: Vec<FileLookup>,
    pub(crate) file_extras: Vec<FileExtra>,
    pub(crate) links: PrimaryLinks,
}

fn sum_counts(
    reader: &TableReader<'_>,
    a: i32,
    b: i32,
    what: &'static str,
) -> Result<usize, FormatError> {
    if a < 0 || b < 0 {
        return checked_count(reader, a.min(b) as i64, what);
    }
    checked_count(reader, a as i64 + b as i64, what)
}

#[inline]
fn checked_index(index: usize, len: usize, what: &'static str) -> Result<usize, FormatError> {
    if index < len {
        Ok(index)
    } else {
        Err(FormatError::IndexOutOfRange { what, index, len })
    }
}

impl PrimaryTable {
    /// Decodes a complete, decompressed primary table.
    pub fn decode(data: &[u8]) -> Result<PrimaryTable, FormatError> {
        let mut reader = Cursor::new(data);
        let header = PrimaryHeader::deserialize_owned(&mut reader).map_err(|source| {
            FormatError::Truncated {
                what: "primary table header",
                source,
            }
        })?;

        let r = &mut reader;
        let h = &header;

        let stream_folders = read_array(
            r,
            checked_count(r, h.stream_folder_count as i64, "stream folders")?,
            "stream folders",
        )?;
        let stream_name_count = checked_count(r, h.stream_name_count as i64, "stream names")?;
        let stream_hashes = read_array(r, stream_name_count, "stream hashes")?;
        let stream_names = read_array(r, stream_name_count, "stream names")?;
        let stream_entities = read_array(
            r,
            checked_count(r, h.stream_entity_count as i64, "stream entities")?,
            "stream entities",
        )?;
        let stream_files = read_array(
            r,
            checked_count(r, h.stream_file_count as i64, "stream files")?,
            "stream files",
        )?;
        let root_hashes = read_array(r, h.root_hash_count as usize, "root hashes")?;
        let directory_count = checked_count(r, h.directory_count as i64, "directories")?;
        let directories = read_array(r, directory_count, "directories")?;
        let directory_offsets = read_array(
            r,
            sum_counts(
                r,
                h.directory_offset_count,
                h.directory_offset_base,
                "directory offsets",
            )?,
            "directory offsets",
        )?;
        let directory_hashes = read_array(
            r,
            checked_count(r, h.directory_hash_count as i64, "directory hashes")?,
            "directory hashes",
        )?;
        let file_count = checked_count(r, h.file_count as i64, "files")?;
        let files = read_array(r, file_count, "files")?;
        let file_offsets = read_array(
            r,
            sum_counts(r, h.file_offset_count, h.file_offset_base, "file offsets")?,
            "file offsets",
        )?;
        let directory_lookups = read_array(r, directory_count, "directory lookups")?;

        let grouped_file_count = r
            .read_u32::<LittleEndian>()
            .map_err(|source| FormatError::Truncated {
                what: "file group header",
                source,
            })?;
        let group_count = read_count(r, "file groups")?;
        let file_groups = read_array(r, group_count, "file groups")?;

        let file_lookups = read_array(
            r,
            checked_count(r, h.file_lookup_count as i64, "file lookups")?,
            "file lookups",
        )?;
        let file_extras = read_array(r, file_count, "file extras")?;

        let mut table = PrimaryTable {
            header,
            stream_folders,
            stream_hashes,
            stream_names,
            stream_entities,
            stream_files,
            root_hashes,
            directories,
            directory_offsets,
            directory_hashes,
            files,
            file_offsets,
            directory_lookups,
            grouped_file_count,
            file_groups,
            file_lookups,
            file_extras,
            links: PrimaryLinks::default(),
        };
        table.link()?;

        tracing::debug!(
            directories = table.directories.len(),
            files = table.files.len(),
            file_offsets = table.file_offsets.len(),
            streams = table.stream_names.len(),
            "decoded primary table"
        );

        Ok(table)
    }

    /// Resolves every index field. Runs once, after all arrays exist.
    pub(crate) fn link(&mut self) -> Result<(), FormatError> {
        let mut links = PrimaryLinks::default();

        links.stream_name_entities = self
            .stream_names
            .iter()
            .map(|x| {
                checked_index(
                    x.stream_index.get() as usize,
                    self.stream_entities.len(),
                    "stream entity",
                )
            })
            .collect::<Result<_, _>>()?;

        links.stream_entity_files = self
            .stream_entities
            .iter()
            .map(|x| {
                checked_index(
                    x.file_index as usize,
                    self.stream_files.len(),
                    "stream file",
                )
            })
            .collect::<Result<_, _>>()?;

        links.stream_hash_names = self
            .stream_hashes
            .iter()
            .map(|x| {
                checked_index(
                    x.name_index.get() as usize,
                    self.stream_names.len(),
                    "stream name",
                )
            })
            .collect::<Result<_, _>>()?;

        links.file_directories = self
            .files
            .iter()
            .map(|x| {
                checked_index(
                    x.directory_index.get() as usize,
                    self.directories.len(),
                    "directory",
                )
            })
            .collect::<Result<_, _>>()?;

        links.file_lookup_files = self
            .file_lookups
            .iter()
            .map(|x| checked_index(x.file_index.get() as usize, self.files.len(), "file"))
            .collect::<Result<_, _>>()?;

        // Lookup indices may run one past the last directory.
        links.directory_lookup_directories = self
            .directory_lookups
            .iter()
            .map(|x| Some(x.directory_index.get() as usize).filter(|&i| i < self.directories.len()))
            .collect();

        links.directory_offsets = self
            .directories
            .iter()
            .map(|x| {
                checked_index(
                    x.offset_index.get() as usize,
                    self.directory_offsets.len(),
                    "directory offset",
                )
            })
            .collect::<Result<_, _>>()?;

        // An empty directory may carry a first-file index one past the end.
        links.directory_first_files = self
            .directories
            .iter()
            .map(|x| Some(x.first_file_index as usize).filter(|&i| i < self.files.len()))
            .collect();

        links.file_offsets = self
            .files
            .iter()
            .map(|x| {
                checked_index(
                    x.offset_index as usize,
                    self.file_offsets.len(),
                    "file offset",
                )
            })
            .collect::<Result<_, _>>()?;

        links.offset_targets = self
            .file_offsets
            .iter()
            .map(|x| self.resolve_offset_target(x))
            .collect();

        links.directory_offset_links = self
            .directory_offsets
            .iter()
            .map(|x| {
                Some(x.link_index as usize)
                    .filter(|&i| x.link_index != crate::hash::INT24_NONE && i < self.directory_offsets.len())
            })
            .collect();

        self.links = links;
        Ok(())
    }

    fn resolve_offset_target(&self, offset: &FileOffset) -> OffsetTarget {
        let target = offset.link_index.get() as usize;

        if !offset.is_redirect() {
            return if target < self.files.len() {
                OffsetTarget::File(target)
            } else {
                OffsetTarget::Dangling
            };
        }

        let real = self.header.file_offset_base.max(0) as usize + target;
        if real >= self.file_offsets.len() {
            return OffsetTarget::UnresolvedRedirect;
        }

        match self.redirect_owner(target) {
            Some(directory_offset) => OffsetTarget::Redirect {
                offset: real,
                directory_offset,
            },
            None => OffsetTarget::UnresolvedRedirect,
        }
    }

    /// Linear scan, in array order from the redirect-target region, for the
    /// first directory offset whose file range contains `target`.
    fn redirect_owner(&self, target: usize) -> Option<usize> {
        let base = self.header.directory_offset_base.max(0) as usize;
        self.directory_offsets
            .iter()
            .enumerate()
            .skip(base)
            .find(|(_, d)| d.owns(target))
            .map(|(i, _)| i)
    }

    /// Adds every checksum stored in the table to `out`.
    pub fn collect_checksums(&self, out: &mut HashSet<HashKey>) {
        out.extend(self.stream_folders.iter().map(|x| x.name));
        out.extend(self.stream_hashes.iter().map(|x| x.hash));
        out.extend(self.stream_names.iter().map(|x| x.hash));
        out.extend(self.root_hashes.iter().map(|x| x.hash));
        for dir in &self.directories {
            out.extend([dir.path, dir.name, dir.parent, dir.lifetime]);
        }
        out.extend(self.directory_hashes.iter().map(|x| x.hash));
        for file in &self.files {
            out.extend([file.path, file.extension, file.parent, file.name]);
        }
        out.extend(self.directory_lookups.iter().map(|x| x.hash));
        out.extend(self.file_lookups.iter().map(|x| x.hash));
    }

    #[inline(always)]
    pub fn header(&self) -> &PrimaryHeader {
        &self.header
    }

    #[inline(always)]
    pub fn directories(&self) -> &[DirectoryRecord] {
        &self.directories
    }

    #[inline(always)]
    pub fn directory_offsets(&self) -> &[DirectoryOffset] {
        &self.directory_offsets
    }

    #[inline(always)]
    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    #[inline(always)]
    pub fn file_offsets(&self) -> &[FileOffset] {
        &self.file_offsets
    }

    #[inline(always)]
    pub fn file_lookups(&self) -> &[FileLookup] {
        &self.file_lookups
    }

    #[inline(always)]
    pub fn directory_lookups(&self) -> &[DirectoryLookup] {
        &self.directory_lookups
    }

    #[inline(always)]
    pub fn file_groups(&self) -> &[FileGroup] {
        &self.file_groups
    }

    #[inline(always)]
    pub fn stream_folders(&self) -> &[StreamFolder] {
        &self.stream_folders
    }

    #[inline(always)]
    pub fn stream_hashes(&self) -> &[StreamHashEntry] {
        &self.stream_hashes
    }

    #[inline(always)]
    pub fn stream_names(&self) -> &[StreamName] {
        &self.stream_names
    }

    #[inline(always)]
    pub fn stream_files(&self) -> &[StreamFile] {
        &self.stream_files
    }

    /// Index of the directory record owning file `index`.
    #[inline(always)]
    pub fn file_directory(&self, index: usize) -> usize {
        self.links.file_directories[index]
    }

    /// Index of the file offset record of file `index`.
    #[inline(always)]
    pub fn file_offset_index(&self, index: usize) -> usize {
        self.links.file_offsets[index]
    }

    /// Index of the directory offset record of directory `index`.
    #[inline(always)]
    pub fn directory_offset_index(&self, index: usize) -> usize {
        self.links.directory_offsets[index]
    }

    #[inline(always)]
    pub fn directory_first_file(&self, index: usize) -> Option<usize> {
        self.links.directory_first_files[index]
    }

    #[inline(always)]
    pub fn offset_target(&self, index: usize) -> OffsetTarget {
        self.links.offset_targets[index]
    }

    #[inline(always)]
    pub fn directory_offset_link(&self, index: usize) -> Option<usize> {
        self.links.directory_offset_links[index]
    }

    #[inline(always)]
    pub fn lookup_file(&self, index: usize) -> usize {
        self.links.file_lookup_files[index]
    }

    #[inline(always)]
    pub fn lookup_directory(&self, index: usize) -> Option<usize> {
        self.links.directory_lookup_directories[index]
    }

    /// Stream file index reached from name slot `index`.
    #[inline(always)]
    pub fn stream_name_file(&self, index: usize) -> usize {
        let entity = self.links.stream_name_entities[index];
        self.links.stream_entity_files[entity]
    }

    /// Stream entity index of name slot `index`.
    #[inline(always)]
    pub fn stream_name_entity(&self, index: usize) -> usize {
        self.links.stream_name_entities[index]
    }

    /// Name slot reached from stream hash entry `index`.
    #[inline(always)]
    pub fn stream_hash_name(&self, index: usize) -> usize {
        self.links.stream_hash_names[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PrimaryTable {
        let mut t = PrimaryTable::default();
        t.header.directory_offset_base = 1;
        t.header.file_offset_base = 2;
        t.directories.push(DirectoryRecord::default());
        t.directory_offsets.push(DirectoryOffset {
            first_file_index: 0,
            file_count: 2,
            link_index: crate::hash::INT24_NONE,
            ..Default::default()
        });
        t.directory_offsets.push(DirectoryOffset {
            first_file_index: 0,
            file_count: 1,
            link_index: 0,
            ..Default::default()
        });
        t.directory_offsets.push(DirectoryOffset {
            first_file_index: 1,
            file_count: 1,
            link_index: crate::hash::INT24_NONE,
            ..Default::default()
        });
        t.files.push(FileRecord::default());
        t.files.push(FileRecord {
            offset_index: 1,
            ..Default::default()
        });
        t.file_offsets.push(FileOffset::default());
        t.file_offsets.push(FileOffset {
            link_index: Int24::new(1),
            flags: OffsetFlags::REDIRECT,
            ..Default::default()
        });
        t.file_offsets.push(FileOffset::default());
        t.file_offsets.push(FileOffset::default());
        t
    }

    #[test]
    fn links_files_and_offsets() {
        let mut t = table();
        t.link().unwrap();
        assert_eq!(t.file_directory(1), 0);
        assert_eq!(t.file_offset_index(1), 1);
        assert_eq!(t.offset_target(0), OffsetTarget::File(0));
        assert_eq!(t.directory_offset_link(0), None);
        assert_eq!(t.directory_offset_link(1), Some(0));
    }

    #[test]
    fn redirect_scans_from_base_for_owning_range() {
        let mut t = table();
        t.link().unwrap();
        // Target 1 -> offset record 2 + 1, owned by directory offset 2 (not 0,
        // which is before the base, and not 1, whose range is [0, 1)).
        assert_eq!(
            t.offset_target(1),
            OffsetTarget::Redirect {
                offset: 3,
                directory_offset: 2
            }
        );
    }

    #[test]
    fn unowned_redirect_is_recorded() {
        let mut t = table();
        t.file_offsets[1].link_index = Int24::new(0x40);
        t.link().unwrap();
        assert_eq!(t.offset_target(1), OffsetTarget::UnresolvedRedirect);
    }

    #[test]
    fn dangling_directory_index_is_fatal() {
        let mut t = table();
        t.files[0].directory_index = Int24::new(5);
        assert!(matches!(
            t.link(),
            Err(FormatError::IndexOutOfRange {
                what: "directory",
                index: 5,
                len: 1
            })
        ));
    }

    #[test]
    fn checksums_cover_file_fields() {
        let mut t = table();
        t.files[0].extension = HashKey::of("nutexb");
        t.link().unwrap();
        let mut out = HashSet::new();
        t.collect_checksums(&mut out);
        assert!(out.contains(&HashKey::of("nutexb")));
    }
}
