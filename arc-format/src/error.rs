use std::path::PathBuf;

use crate::hash::HashKey;

/// A display path that cannot become a host-relative output path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntoArcPathError {
    #[error("Path contains a control character, separator or backslash.")]
    UnrepresentableStr,

    #[error("Path has no components left after sanitising.")]
    EmptyPath,
}

/// Malformed binary layout. The table or record being decoded is unusable.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Table ended while reading {what}.")]
    Truncated {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid count {count} for {what} ({available} bytes left).")]
    InvalidCount {
        what: &'static str,
        count: i64,
        available: u64,
    },

    #[error("{what} index {index:#x} is out of range (length {len:#x}).")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Link chain starting at file {start:#x} did not terminate within {hops} hops.")]
    LinkCycle { start: usize, hops: usize },

    #[error("Redirect target {target:#x} of file offset {offset_index:#x} is not owned by any directory offset.")]
    UnownedRedirect { offset_index: usize, target: usize },

    #[error("Byte range {offset:#x}+{len:#x} lies outside the archive (size {size:#x}).")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("No directory resolves to the root path.")]
    MissingRoot,

    #[error("Entry {index:#x} names parent {parent} which is not a directory.")]
    UnknownParent { index: usize, parent: HashKey },

    #[error("Directory entry {index:#x} has path {path} which is not in the directory table.")]
    UnknownDirectory { index: usize, path: HashKey },
}

/// The decompression codec rejected a block.
#[derive(Debug, thiserror::Error)]
pub enum CorruptBlockError {
    #[error("Block could not be decompressed.")]
    Codec(#[source] std::io::Error),

    #[error("Block decompressed to {actual:#x} bytes, expected {expected:#x}.")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Compiled without support for compressed blocks.")]
    Unsupported,
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("Could not read header. Is this a valid archive?")]
    MissingHeader(#[source] std::io::Error),

    #[error("Could not read the metadata tables.")]
    ReadTables(#[source] std::io::Error),

    #[error("Metadata table block is corrupt.")]
    CorruptTable(#[source] CorruptBlockError),

    #[error("Metadata table is malformed.")]
    InvalidTable(#[source] FormatError),

    #[error("Failed to read archive. Path: '{}'", .1.display())]
    ReadFailed(#[source] std::io::Error, PathBuf),
}

impl From<FormatError> for OpenError {
    fn from(e: FormatError) -> Self {
        OpenError::InvalidTable(e)
    }
}

/// Failure to produce the bytes of a single file or stream.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    CorruptBlock(#[from] CorruptBlockError),

    #[error("Reading archive data failed.")]
    Io(#[from] std::io::Error),
}

/// Failure to extract a single entry. Bulk extraction logs and skips these.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Creating directory failed. Path: '{}'", .1.display())]
    CreateDirFailed(#[source] std::io::Error, PathBuf),

    #[error("Creating file failed. Path: '{}'", .1.display())]
    CreateFileFailed(#[source] std::io::Error, PathBuf),

    #[error("Reading entry {1:#x} failed. Path: '{}'", .2.display())]
    ReadFailed(#[source] ReadError, usize, PathBuf),

    #[error("Could not convert to an output path: '{1}'")]
    InvalidPath(#[source] IntoArcPathError, String),
}

/// Kinds of structural inconsistency found while validating recovered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Text contains `..`, `./`, `/.`, `//` or ends in `.`.
    InvalidString,
    /// A parent that must end in `/` does not.
    MissingTrailingSlash,
    /// The extension text is not the extension of the name or path.
    ExtensionMismatch,
    /// The path does not split into the stored parent and name checksums.
    ParentMismatch,
    /// Parent and name text do not join into the path text.
    JoinMismatch,
    /// A tree node failed its suffix/prefix checks.
    InvalidNode,
    /// A directory entry disagrees with its directory record.
    ImportMismatch,
}

/// A non-fatal consistency problem. Never returned as an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyWarning {
    pub kind: WarningKind,
    pub key: HashKey,
    pub text: String,
    /// Whether the checksum's text was removed from the dictionary.
    pub evicted: bool,
}
