use std::fs::File;
use std::io::BufReader;
use std::ops::RangeInclusive;
use std::path::Path;

use arc_format::{ArcFile, HashRegistry, MappedArcFile, Progress};
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct ParseCharsetError(String);

impl std::error::Error for ParseCharsetError {}

impl std::fmt::Display for ParseCharsetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Expected an ASCII range like `a-z`, got: {}", self.0)
    }
}

/// Parses `a-z` style byte ranges for brute forcing.
pub fn parse_charset(src: &str) -> std::result::Result<RangeInclusive<u8>, ParseCharsetError> {
    match src.as_bytes() {
        [low, b'-', high] if low.is_ascii() && high.is_ascii() && low <= high => Ok(*low..=*high),
        _ => Err(ParseCharsetError(src.to_string())),
    }
}

/// Create a progress bar for file operations
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(message.to_string());
    pb
}

/// Feeds library progress into a terminal progress bar. Messages are printed
/// above the bar.
pub struct BarProgress(pub ProgressBar);

impl BarProgress {
    pub fn new(message: &str) -> BarProgress {
        BarProgress(create_progress_bar(0, message))
    }

    pub fn finish(self) {
        self.0.finish_with_message("Done");
    }
}

impl Progress for BarProgress {
    fn set_total(&mut self, total: u64) {
        self.0.set_length(total);
        self.0.set_position(0);
    }

    fn report_add(&mut self, delta: u64) {
        self.0.inc(delta);
    }

    fn log_message(&mut self, message: &str) {
        self.0.println(message);
    }
}

pub fn open_archive(path: &Path) -> Result<MappedArcFile> {
    ArcFile::open(path).map_err(|source| Error::OpenArchive {
        path: path.to_path_buf(),
        source,
    })
}

/// Registry over every checksum in `arc`, seeded from `dictionary` if given.
pub fn load_registry<R>(arc: &ArcFile<R>, dictionary: Option<&Path>) -> Result<HashRegistry>
where
    R: std::io::Read + std::io::Seek,
{
    let mut registry = HashRegistry::new(arc.checksums());

    if let Some(path) = dictionary {
        let read_error = |source| Error::ReadDictionary {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(read_error)?;
        let count = registry
            .load_dictionary(BufReader::new(file))
            .map_err(read_error)?;
        tracing::info!("Loaded {} strings from {}", count, path.display());
    }

    tracing::info!("Known checksums: {}", registry.coverage());
    tracing::info!("Known file paths: {}", arc.file_path_coverage(&registry));

    Ok(registry)
}

/// Format file size in human-readable form
pub fn format_size(bytes: u64) -> String {
    use humansize::{file_size_opts as options, FileSize};
    bytes
        .file_size(options::BINARY)
        .unwrap_or_else(|_| bytes.to_string())
}
