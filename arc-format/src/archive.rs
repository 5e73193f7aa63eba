use std::collections::HashSet;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;

use crate::{
    compression::{BlockDecompressor, Compression, ZstdBlocks},
    de::DeserializeOwned,
    error::{FormatError, OpenError, ReadError},
    hash::HashKey,
    header::{ArchiveHeader, CompressedTableHeader, COMPRESSED_TABLE_THRESHOLD},
    primary::{OffsetTarget, PrimaryTable},
    registry::{Coverage, HashRegistry},
    secondary::SecondaryTable,
};

/// Upper bound on link hops before a chain is treated as a cycle.
pub const MAX_LINK_HOPS: usize = 64;

/// Name slots past this index hold video streams.
pub const VIDEO_STREAM_SLOT_START: usize = 0x92b;

/// Physical placement of one file's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLocation {
    /// File index whose content is actually read, after following links.
    pub file_index: usize,
    /// Absolute archive offset.
    pub offset: u64,
    pub stored_size: u64,
    pub logical_size: u64,
    pub compression: Compression,
}

impl FileLocation {
    #[inline(always)]
    pub fn is_compressed(&self) -> bool {
        self.compression == Compression::Zstd
    }

    /// Number of bytes occupied in the archive.
    #[inline(always)]
    pub fn stored_len(&self) -> u64 {
        match self.compression {
            Compression::Stored => self.logical_size,
            Compression::Zstd => self.stored_size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKey<'a> {
    /// Position in the stream name array.
    Slot(usize),
    /// Full stream path, e.g. `stream:/sound/bgm/bgm_crs2_01_menu.nus3audio`.
    Name(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamLocation {
    pub slot: usize,
    pub file_index: usize,
    pub offset: u64,
    pub size: u64,
}

/// An archive opened from disk with [`ArcFile::open`].
pub type MappedArcFile = ArcFile<Cursor<Mmap>>;

/// A decoded archive over a random-access byte source.
pub struct ArcFile<R> {
    pub(crate) reader: R,
    pub(crate) path: Option<PathBuf>,
    pub(crate) len: u64,
    pub(crate) header: ArchiveHeader,
    pub(crate) primary: PrimaryTable,
    pub(crate) secondary: SecondaryTable,
    pub(crate) decompressor: Box<dyn BlockDecompressor>,
}

impl MappedArcFile {
    /// Memory-maps the archive at `path` and decodes its metadata tables.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| OpenError::ReadFailed(e, path.to_path_buf()))?;
        let mmap =
            unsafe { Mmap::map(&file) }.map_err(|e| OpenError::ReadFailed(e, path.to_path_buf()))?;

        let mut arc = ArcFile::from_reader(Cursor::new(mmap))?;
        arc.path = Some(path.to_path_buf());
        Ok(arc)
    }
}

impl<R: Read + Seek> ArcFile<R> {
    pub fn from_reader(reader: R) -> Result<Self, OpenError> {
        Self::with_decompressor(reader, Box::new(ZstdBlocks))
    }

    pub fn with_decompressor(
        mut reader: R,
        decompressor: Box<dyn BlockDecompressor>,
    ) -> Result<Self, OpenError> {
        let len = reader
            .seek(SeekFrom::End(0))
            .map_err(OpenError::MissingHeader)?;
        reader
            .seek(SeekFrom::Start(0))
            .map_err(OpenError::MissingHeader)?;
        let header = ArchiveHeader::deserialize_owned(&mut reader).map_err(OpenError::MissingHeader)?;

        let (primary, secondary) = read_tables(&mut reader, &header, len, &*decompressor)?;
        let primary = PrimaryTable::decode(&primary)?;
        let secondary = SecondaryTable::decode(&secondary)?;

        Ok(ArcFile {
            reader,
            path: None,
            len,
            header,
            primary,
            secondary,
            decompressor,
        })
    }

    #[inline(always)]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Size of the byte source.
    #[inline(always)]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline(always)]
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    #[inline(always)]
    pub fn primary(&self) -> &PrimaryTable {
        &self.primary
    }

    #[inline(always)]
    pub fn secondary(&self) -> &SecondaryTable {
        &self.secondary
    }

    /// Every checksum stored anywhere in either table.
    pub fn checksums(&self) -> HashSet<HashKey> {
        let mut out = HashSet::new();
        self.primary.collect_checksums(&mut out);
        self.secondary.collect_checksums(&mut out);
        out.remove(&HashKey::EMPTY);
        out
    }

    /// How many file lookup path checksums have known text.
    pub fn file_path_coverage(&self, registry: &HashRegistry) -> Coverage {
        registry.coverage_of(self.primary.file_lookups().iter().map(|x| x.hash))
    }

    /// Index of the file whose path checksum matches `path`.
    pub fn find_file(&self, path: &str) -> Option<usize> {
        let hash = HashKey::checked(path)?;
        let primary = &self.primary;

        primary
            .file_lookups()
            .iter()
            .position(|x| x.hash == hash)
            .map(|i| primary.lookup_file(i))
            .filter(|&i| primary.files()[i].path == hash)
            .or_else(|| primary.files().iter().position(|x| x.path == hash))
    }

    /// Follows links and redirects from file `index` to the bytes that hold
    /// its content.
    pub fn resolve_file_location(&self, index: usize) -> Result<FileLocation, FormatError> {
        let primary = &self.primary;
        let files = primary.files();

        if index >= files.len() {
            return Err(FormatError::IndexOutOfRange {
                what: "file",
                index,
                len: files.len(),
            });
        }

        let mut file = index;
        let mut hops = 0;
        while files[file].is_link() {
            if hops == MAX_LINK_HOPS {
                return Err(FormatError::LinkCycle { start: index, hops });
            }

            let offset = primary.file_offset_index(file);
            file = match primary.offset_target(offset) {
                OffsetTarget::File(next) => next,
                _ => {
                    return Err(FormatError::IndexOutOfRange {
                        what: "link target file",
                        index: primary.file_offsets()[offset].link_index.get() as usize,
                        len: files.len(),
                    })
                }
            };
            hops += 1;
        }

        let mut directory_offset = primary.directory_offset_index(primary.file_directory(file));
        let mut offset = primary.file_offset_index(file);

        if primary.file_offsets()[offset].is_redirect() {
            match primary.offset_target(offset) {
                OffsetTarget::Redirect {
                    offset: target,
                    directory_offset: owner,
                } => {
                    offset = target;
                    directory_offset = owner;
                }
                _ => {
                    return Err(FormatError::UnownedRedirect {
                        offset_index: offset,
                        target: primary.file_offsets()[offset].link_index.get() as usize,
                    })
                }
            }
        }

        let directory_offset = &primary.directory_offsets()[directory_offset];
        let info = &primary.file_offsets()[offset];
        let stored_size = info.compressed_size as u64;
        let logical_size = info.size as u64;

        let compression = if stored_size != 0 && stored_size != logical_size {
            Compression::Zstd
        } else {
            Compression::Stored
        };

        let position = self
            .header
            .data_offset
            .checked_add(directory_offset.offset)
            .and_then(|x| x.checked_add(info.offset as u64 * 4));

        let location = FileLocation {
            file_index: file,
            offset: position.unwrap_or(u64::MAX),
            stored_size,
            logical_size,
            compression,
        };

        if logical_size != 0 {
            self.check_bounds(position, location.stored_len())?;
        }

        Ok(location)
    }

    pub fn resolve_stream_location(&self, key: StreamKey<'_>) -> Option<StreamLocation> {
        let primary = &self.primary;

        let slot = match key {
            StreamKey::Slot(slot) => Some(slot).filter(|&x| x < primary.stream_names().len())?,
            StreamKey::Name(name) => {
                let hash = HashKey::checked(name)?;
                primary
                    .stream_hashes()
                    .iter()
                    .position(|x| x.hash == hash)
                    .map(|i| primary.stream_hash_name(i))
                    .or_else(|| primary.stream_names().iter().position(|x| x.hash == hash))?
            }
        };

        let file_index = primary.stream_name_file(slot);
        let file = &primary.stream_files()[file_index];

        Some(StreamLocation {
            slot,
            file_index,
            offset: file.offset,
            size: file.size,
        })
    }

    /// Reads and, if needed, decompresses the content of file `index`.
    pub fn read_file(&mut self, index: usize) -> Result<Vec<u8>, ReadError> {
        let location = self.resolve_file_location(index)?;
        self.read_location(&location)
    }

    pub fn read_location(&mut self, location: &FileLocation) -> Result<Vec<u8>, ReadError> {
        if location.logical_size == 0 {
            return Ok(Vec::new());
        }

        self.reader.seek(SeekFrom::Start(location.offset))?;

        match location.compression {
            Compression::Stored => {
                let mut buf = Vec::with_capacity(location.logical_size as usize);
                let reader = self.reader.by_ref().take(location.logical_size);
                Compression::Stored.decompress_write(reader, &mut buf)?;

                if buf.len() as u64 != location.logical_size {
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
                }
                Ok(buf)
            }
            Compression::Zstd => Ok(self.decompressor.decompress(
                &mut self.reader,
                location.stored_size,
                location.logical_size,
            )?),
        }
    }

    /// Stream data is never compressed.
    pub fn read_stream(&mut self, location: &StreamLocation) -> Result<Vec<u8>, ReadError> {
        self.read_raw(location.offset, location.size)
    }

    /// Reads `len` bytes at `offset` without interpretation.
    pub fn read_raw(&mut self, offset: u64, len: u64) -> Result<Vec<u8>, ReadError> {
        self.check_bounds(Some(offset), len)?;

        let mut buf = vec![0u8; len as usize];
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn check_bounds(&self, offset: Option<u64>, len: u64) -> Result<(), FormatError> {
        match offset.and_then(|x| x.checked_add(len)) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(FormatError::OutOfBounds {
                offset: offset.unwrap_or(u64::MAX),
                len,
                size: self.len,
            }),
        }
    }
}

/// Reads both metadata tables, compressed or raw, as decided by the first
/// word of the primary table.
fn read_tables<R: Read + Seek>(
    reader: &mut R,
    header: &ArchiveHeader,
    len: u64,
    decompressor: &dyn BlockDecompressor,
) -> Result<(Vec<u8>, Vec<u8>), OpenError> {
    reader
        .seek(SeekFrom::Start(header.primary_table_offset))
        .map_err(OpenError::ReadTables)?;
    let first = reader
        .read_i32::<LittleEndian>()
        .map_err(OpenError::ReadTables)?;

    if first < COMPRESSED_TABLE_THRESHOLD {
        tracing::debug!(first, "metadata tables are compressed");
        let primary = read_compressed_table(reader, header.primary_table_offset, decompressor)?;
        let secondary =
            read_compressed_table(reader, header.secondary_table_offset, decompressor)?;
        Ok((primary, secondary))
    } else {
        tracing::debug!(first, "metadata tables are stored");
        let primary = read_stored_table(reader, header.primary_table_offset, len)?;
        let secondary = read_stored_table(reader, header.secondary_table_offset, len)?;
        Ok((primary, secondary))
    }
}

fn read_compressed_table<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    decompressor: &dyn BlockDecompressor,
) -> Result<Vec<u8>, OpenError> {
    reader
        .seek(SeekFrom::Start(offset))
        .map_err(OpenError::ReadTables)?;
    let table = CompressedTableHeader::deserialize_owned(reader).map_err(OpenError::ReadTables)?;

    reader
        .seek(SeekFrom::Start(offset + table.data_offset as u64))
        .map_err(OpenError::ReadTables)?;

    decompressor
        .decompress(reader, table.compressed_size as u64, table.size as u64)
        .map_err(OpenError::CorruptTable)
}

/// A stored table begins with its own total length, which includes the
/// length word.
fn read_stored_table<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    len: u64,
) -> Result<Vec<u8>, OpenError> {
    reader
        .seek(SeekFrom::Start(offset))
        .map_err(OpenError::ReadTables)?;
    let length = reader
        .read_i32::<LittleEndian>()
        .map_err(OpenError::ReadTables)?;

    if length < 0 || offset.saturating_add(length as u64) > len {
        return Err(FormatError::OutOfBounds {
            offset,
            len: length as u64,
            size: len,
        }
        .into());
    }

    let mut buf = vec![0u8; length as usize];
    reader
        .seek(SeekFrom::Start(offset))
        .map_err(OpenError::ReadTables)?;
    reader.read_exact(&mut buf).map_err(OpenError::ReadTables)?;
    Ok(buf)
}
