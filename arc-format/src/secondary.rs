//! The secondary metadata table: a plain hierarchy of directories and
//! sibling-linked entries, used to rebuild the filesystem tree.

use std::collections::HashSet;
use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::de::{checked_count, read_array, skip_padding, DeserializeOwned};
use crate::error::FormatError;
use crate::hash::{HashKey, Int24};

/// Entry type bit marking a directory entry.
pub const ENTRY_TYPE_DIRECTORY: u32 = 0x40_0000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecondaryHeader {
    pub length: i32,
    pub unknown_4: i32,
    pub directory_count: i32,
    pub unknown_c_count: i32,
    pub entry_count: i32,
}

impl DeserializeOwned for SecondaryHeader {
    const SIZE: u64 = 0x14;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(SecondaryHeader {
            length: reader.read_i32::<LittleEndian>()?,
            unknown_4: reader.read_i32::<LittleEndian>()?,
            directory_count: reader.read_i32::<LittleEndian>()?,
            unknown_c_count: reader.read_i32::<LittleEndian>()?,
            entry_count: reader.read_i32::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyLookup {
    pub hash: HashKey,
    pub index: Int24,
}

impl DeserializeOwned for HierarchyLookup {
    const SIZE: u64 = 8;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        Ok(HierarchyLookup {
            hash: HashKey::deserialize_owned(reader)?,
            index: Int24::deserialize_owned(reader)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyDirectory {
    pub path: HashKey,
    pub child_directory_count: Int24,
    pub parent: HashKey,
    pub child_file_count: Int24,
    pub name: HashKey,
    /// Index of the first child in the entry array.
    pub entry_start: u32,
    pub entry_count: u32,
}

impl DeserializeOwned for HierarchyDirectory {
    const SIZE: u64 = 32;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let path = HashKey::deserialize_owned(reader)?;
        let child_directory_count = Int24::deserialize_owned(reader)?;
        let parent = HashKey::deserialize_owned(reader)?;
        let child_file_count = Int24::deserialize_owned(reader)?;
        let name = HashKey::deserialize_owned(reader)?;
        skip_padding(reader)?;

        Ok(HierarchyDirectory {
            path,
            child_directory_count,
            parent,
            child_file_count,
            name,
            entry_start: reader.read_u32::<LittleEndian>()?,
            entry_count: reader.read_u32::<LittleEndian>()?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyEntry {
    pub path: HashKey,
    /// Next entry under the same parent, or `0xFFFFFF`.
    pub next_sibling: Int24,
    pub parent: HashKey,
    pub kind: Int24,
    pub name: HashKey,
    pub extension: HashKey,
}

impl HierarchyEntry {
    #[inline(always)]
    pub fn is_directory(&self) -> bool {
        self.kind.get() & ENTRY_TYPE_DIRECTORY != 0
    }
}

impl DeserializeOwned for HierarchyEntry {
    const SIZE: u64 = 32;

    fn deserialize_owned<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let path = HashKey::deserialize_owned(reader)?;
        let next_sibling = Int24::deserialize_owned(reader)?;
        let parent = HashKey::deserialize_owned(reader)?;
        let kind = Int24::deserialize_owned(reader)?;
        let name = HashKey::deserialize_owned(reader)?;
        skip_padding(reader)?;
        let extension = HashKey::deserialize_owned(reader)?;
        skip_padding(reader)?;

        Ok(HierarchyEntry {
            path,
            next_sibling,
            parent,
            kind,
            name,
            extension,
        })
    }
}

#[derive(Debug, Default)]
pub struct SecondaryTable {
    pub(crate) header: SecondaryHeader,
    pub(crate) directory_lookups: Vec<HierarchyLookup>,
    pub(crate) directories: Vec<HierarchyDirectory>,
    pub(crate) entry_lookups: Vec<HierarchyLookup>,
    pub(crate) unknown_c: Vec<u32>,
    pub(crate) entries: Vec<HierarchyEntry>,
    pub(crate) directory_first_entries: Vec<Option<usize>>,
    pub(crate) entry_siblings: Vec<Option<usize>>,
}

impl SecondaryTable {
    /// Decodes a complete, decompressed secondary table.
    pub fn decode(data: &[u8]) -> Result<SecondaryTable, FormatError> {
        let mut reader = Cursor::new(data);
        let header = SecondaryHeader::deserialize_owned(&mut reader).map_err(|source| {
            FormatError::Truncated {
                what: "secondary table header",
                source,
            }
        })?;
        let r = &mut reader;

        let directory_count =
            checked_count(r, header.directory_count as i64, "hierarchy directories")?;
        let entry_count = checked_count(r, header.entry_count as i64, "hierarchy entries")?;

        let directory_lookups = read_array(r, directory_count, "hierarchy directory lookups")?;
        let directories = read_array(r, directory_count, "hierarchy directories")?;
        let entry_lookups = read_array(r, entry_count, "hierarchy entry lookups")?;
        let unknown_c = read_array(
            r,
            checked_count(r, header.unknown_c_count as i64, "hierarchy unknown words")?,
            "hierarchy unknown words",
        )?;
        let entries = read_array(r, entry_count, "hierarchy entries")?;

        let mut table = SecondaryTable {
            header,
            directory_lookups,
            directories,
            entry_lookups,
            unknown_c,
            entries,
            ..Default::default()
        };
        table.link()?;

        tracing::debug!(
            directories = table.directories.len(),
            entries = table.entries.len(),
            "decoded secondary table"
        );

        Ok(table)
    }

    pub(crate) fn link(&mut self) -> Result<(), FormatError> {
        for lookup in &self.directory_lookups {
            check(lookup.index, self.directories.len(), "hierarchy directory")?;
        }
        for lookup in &self.entry_lookups {
            check(lookup.index, self.entries.len(), "hierarchy entry")?;
        }

        let entries = self.entries.len();

        // Empty directories may point one past the last entry.
        self.directory_first_entries = self
            .directories
            .iter()
            .map(|x| Some(x.entry_start as usize).filter(|&i| x.entry_count > 0 && i < entries))
            .collect();

        self.entry_siblings = self
            .entries
            .iter()
            .map(|x| match x.next_sibling.index() {
                None => Ok(None),
                Some(i) if i < entries => Ok(Some(i)),
                Some(index) => Err(FormatError::IndexOutOfRange {
                    what: "hierarchy sibling",
                    index,
                    len: entries,
                }),
            })
            .collect::<Result<_, _>>()?;

        Ok(())
    }

    pub fn collect_checksums(&self, out: &mut HashSet<HashKey>) {
        out.extend(self.directory_lookups.iter().map(|x| x.hash));
        for dir in &self.directories {
            out.extend([dir.path, dir.parent, dir.name]);
        }
        out.extend(self.entry_lookups.iter().map(|x| x.hash));
        for entry in &self.entries {
            out.extend([entry.path, entry.parent, entry.name, entry.extension]);
        }
    }

    #[inline(always)]
    pub fn header(&self) -> &SecondaryHeader {
        &self.header
    }

    #[inline(always)]
    pub fn directories(&self) -> &[HierarchyDirectory] {
        &self.directories
    }

    #[inline(always)]
    pub fn entries(&self) -> &[HierarchyEntry] {
        &self.entries
    }

    #[inline(always)]
    pub fn directory_lookups(&self) -> &[HierarchyLookup] {
        &self.directory_lookups
    }

    #[inline(always)]
    pub fn entry_lookups(&self) -> &[HierarchyLookup] {
        &self.entry_lookups
    }

    #[inline(always)]
    pub fn directory_first_entry(&self, index: usize) -> Option<usize> {
        self.directory_first_entries[index]
    }

    #[inline(always)]
    pub fn entry_sibling(&self, index: usize) -> Option<usize> {
        self.entry_siblings[index]
    }
}

#[inline]
fn check(index: Int24, len: usize, what: &'static str) -> Result<(), FormatError> {
    let index = index.get() as usize;
    if index < len {
        Ok(())
    } else {
        Err(FormatError::IndexOutOfRange { what, index, len })
    }
}
