mod archive;
mod compression;
mod de;
mod error;
pub mod extract;
mod hash;
mod header;
pub mod path;
pub mod primary;
mod progress;
pub mod reconstruct;
pub mod registry;
pub mod secondary;
pub mod tree;

pub use archive::{
    ArcFile, FileLocation, MappedArcFile, StreamKey, StreamLocation, MAX_LINK_HOPS,
    VIDEO_STREAM_SLOT_START,
};
pub use compression::{BlockDecompressor, Compression, ZstdBlocks};
pub use error::{
    ConsistencyWarning, CorruptBlockError, ExtractError, FormatError, IntoArcPathError, OpenError,
    ReadError, WarningKind,
};
pub use extract::{ExtractOptions, ExtractStats};
pub use hash::{crc32_folded, HashKey, Int24, INT24_NONE};
pub use header::{ArchiveHeader, CompressedTableHeader};
pub use path::ArcPath;
pub use primary::{OffsetTarget, PrimaryTable};
pub use progress::{NoProgress, Progress};
pub use reconstruct::{PathGrammar, ReconstructOptions, ReconstructStats, Reconstructor};
pub use registry::{Coverage, Discovery, HashFilter, HashRegistry};
pub use secondary::SecondaryTable;
pub use tree::{FsNode, FsTree, NodeKind};

#[doc(hidden)]
pub use comde;
