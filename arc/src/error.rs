use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot open archive `{}`", .path.display())]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: arc_format::OpenError,
    },

    #[error("Cannot read dictionary `{}`", .path.display())]
    ReadDictionary {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write `{}`", .path.display())]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write to standard output")]
    Stdout {
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot extract files")]
    Extract {
        #[source]
        source: arc_format::ExtractError,
    },

    #[error("Cannot build the directory tree")]
    BuildTree {
        #[source]
        source: arc_format::FormatError,
    },
}
