//! Bulk extraction of files and streams to a host directory.
//!
//! A failing entry is logged, its partial output removed, and the scan
//! continues. Only failing to create the output root is returned as an error.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, Write};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::archive::{ArcFile, StreamKey, VIDEO_STREAM_SLOT_START};
use crate::error::{ExtractError, ReadError};
use crate::path::ArcPath;
use crate::primary::PrimaryTable;
use crate::progress::Progress;
use crate::registry::HashRegistry;

/// Prefix of every stream name.
pub const STREAM_PREFIX: &str = "stream:/";

/// Directory under the output root receiving raw bytes of undecodable files.
pub const QUARANTINE_DIR: &str = "bad";

/// Options for extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Dump the stored bytes of files that fail to decompress to
    /// `<out>/bad/<index>`.
    pub quarantine: bool,
    /// Replace files that already exist.
    pub overwrite: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            quarantine: false,
            overwrite: true,
        }
    }
}

/// Statistics from extracting files from an archive.
#[derive(Debug, Clone, Default)]
pub struct ExtractStats {
    pub files_extracted: u64,
    pub bytes_written: u64,
    /// Entries skipped because of an error.
    pub failures: u64,
    /// Failed entries whose raw bytes were dumped.
    pub quarantined: u64,
    /// Entries left alone because the output already existed.
    pub skipped: u64,
    pub elapsed: Duration,
}

impl AddAssign for ExtractStats {
    fn add_assign(&mut self, other: Self) {
        self.files_extracted += other.files_extracted;
        self.bytes_written += other.bytes_written;
        self.failures += other.failures;
        self.quarantined += other.quarantined;
        self.skipped += other.skipped;
        self.elapsed += other.elapsed;
    }
}

/// Relative output path of file `index`: its path text, else
/// `<parent>/<index>` when the parent is known, else `_/<index>`.
pub fn file_output_path(primary: &PrimaryTable, registry: &HashRegistry, index: usize) -> String {
    let file = &primary.files()[index];

    if let Some(path) = registry.meaningful_text(file.path) {
        return path.to_string();
    }

    match registry.meaningful_text(file.parent) {
        Some(parent) => format!("{}/{:05x}", parent.trim_end_matches('/'), index),
        None => format!("_/{:05x}", index),
    }
}

/// Relative output path of stream name slot `slot`.
pub fn stream_output_path<R: Read + Seek>(
    arc: &ArcFile<R>,
    registry: &HashRegistry,
    slot: usize,
) -> String {
    let primary = arc.primary();
    let name = match registry.meaningful_text(primary.stream_names()[slot].hash) {
        Some(name) => name.to_string(),
        None => {
            let mut name = format!("{:04x}", primary.stream_name_file(slot));
            if slot >= VIDEO_STREAM_SLOT_START {
                name.push_str(".webm");
            }
            name
        }
    };

    name.replace(STREAM_PREFIX, "")
}

enum Outcome {
    Written(u64),
    Skipped,
}

fn create_output_root(out_dir: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(out_dir).map_err(|e| ExtractError::CreateDirFailed(e, out_dir.to_path_buf()))
}

fn destination(out_dir: &Path, relative: &str) -> Result<PathBuf, ExtractError> {
    let path =
        ArcPath::new(relative).map_err(|e| ExtractError::InvalidPath(e, relative.to_string()))?;
    Ok(out_dir.join(path.to_path_buf()))
}

fn write_output(path: &Path, data: &[u8]) -> Result<(), ExtractError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ExtractError::CreateDirFailed(e, parent.to_path_buf()))?;
    }

    let file =
        File::create(path).map_err(|e| ExtractError::CreateFileFailed(e, path.to_path_buf()))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(data)
        .and_then(|_| writer.flush())
        .map_err(|e| ExtractError::CreateFileFailed(e, path.to_path_buf()))
}

/// Extracts one file. Returns the number of bytes written.
pub fn extract_file<R: Read + Seek>(
    arc: &mut ArcFile<R>,
    registry: &HashRegistry,
    index: usize,
    out_dir: &Path,
    options: &ExtractOptions,
) -> Result<u64, ExtractError> {
    let relative = file_output_path(arc.primary(), registry, index);
    let path = destination(out_dir, &relative)?;

    match extract_to(arc, index, &path, options)? {
        Outcome::Written(n) => Ok(n),
        Outcome::Skipped => Ok(0),
    }
}

fn extract_to<R: Read + Seek>(
    arc: &mut ArcFile<R>,
    index: usize,
    path: &Path,
    options: &ExtractOptions,
) -> Result<Outcome, ExtractError> {
    if !options.overwrite && path.exists() {
        return Ok(Outcome::Skipped);
    }

    let data = arc
        .read_file(index)
        .map_err(|e| ExtractError::ReadFailed(e, index, path.to_path_buf()))?;
    write_output(path, &data)?;
    Ok(Outcome::Written(data.len() as u64))
}

/// Extracts every primary-table file under `out_dir`.
pub fn extract_files<R: Read + Seek>(
    arc: &mut ArcFile<R>,
    registry: &HashRegistry,
    out_dir: &Path,
    options: &ExtractOptions,
    progress: &mut dyn Progress,
) -> Result<ExtractStats, ExtractError> {
    create_output_root(out_dir)?;

    let start = Instant::now();
    let mut stats = ExtractStats::default();
    let count = arc.primary().files().len();
    progress.set_total(count as u64);

    for index in 0..count {
        let relative = file_output_path(arc.primary(), registry, index);
        let result = destination(out_dir, &relative)
            .and_then(|path| extract_to(arc, index, &path, options).map(|x| (path, x)));

        match result {
            Ok((_, Outcome::Written(n))) => {
                stats.files_extracted += 1;
                stats.bytes_written += n;
            }
            Ok((_, Outcome::Skipped)) => stats.skipped += 1,
            Err(e) => {
                stats.failures += 1;
                if handle_failure(arc, index, out_dir, &relative, e, options, progress) {
                    stats.quarantined += 1;
                }
            }
        }

        progress.report_add(1);
    }

    stats.elapsed = start.elapsed();
    tracing::debug!(?stats, "extracted files");
    Ok(stats)
}

/// Logs a failed entry and removes its output. Returns whether the stored
/// bytes were quarantined.
fn handle_failure<R: Read + Seek>(
    arc: &mut ArcFile<R>,
    index: usize,
    out_dir: &Path,
    relative: &str,
    error: ExtractError,
    options: &ExtractOptions,
    progress: &mut dyn Progress,
) -> bool {
    tracing::debug!(index, error = ?error, "extraction failed");

    let path = match &error {
        ExtractError::ReadFailed(_, _, path)
        | ExtractError::CreateFileFailed(_, path)
        | ExtractError::CreateDirFailed(_, path) => Some(path.clone()),
        ExtractError::InvalidPath(..) => None,
    };
    if let Some(path) = &path {
        if path.is_file() {
            let _ = fs::remove_file(path);
        }
    }

    match error {
        ExtractError::ReadFailed(ReadError::CorruptBlock(_), ..) => {
            let location = arc.resolve_file_location(index).ok();
            progress.log_message(&format!(
                "File index 0x{:05x} Offset 0x{:09x}: Can't decompress {}",
                index,
                location.map_or(0, |x| x.offset),
                relative
            ));

            match location {
                Some(location) if options.quarantine => {
                    let bad = out_dir.join(QUARANTINE_DIR).join(index.to_string());
                    match arc.read_raw(location.offset, location.stored_len()) {
                        Ok(raw) => write_output(&bad, &raw).is_ok(),
                        Err(_) => false,
                    }
                }
                _ => false,
            }
        }
        error => {
            progress.log_message(&format!(
                "File index 0x{:05x}: Bad path {} ({})",
                index, relative, error
            ));
            false
        }
    }
}

/// Copies every stream, uncompressed, under `out_dir`.
pub fn extract_streams<R: Read + Seek>(
    arc: &mut ArcFile<R>,
    registry: &HashRegistry,
    out_dir: &Path,
    progress: &mut dyn Progress,
) -> Result<ExtractStats, ExtractError> {
    create_output_root(out_dir)?;

    let start = Instant::now();
    let mut stats = ExtractStats::default();
    let count = arc.primary().stream_names().len();
    progress.set_total(count as u64);

    for slot in 0..count {
        let relative = stream_output_path(arc, registry, slot);
        let result = destination(out_dir, &relative).and_then(|path| {
            let location = match arc.resolve_stream_location(StreamKey::Slot(slot)) {
                Some(location) => location,
                None => return Ok(0),
            };
            let data = arc
                .read_stream(&location)
                .map_err(|e| ExtractError::ReadFailed(e, slot, path.clone()))?;
            write_output(&path, &data)?;
            Ok(data.len() as u64)
        });

        match result {
            Ok(n) => {
                stats.files_extracted += 1;
                stats.bytes_written += n;
            }
            Err(e) => {
                stats.failures += 1;
                progress.log_message(&format!("Stream 0x{:04x}: {} ({})", slot, relative, e));
            }
        }

        progress.report_add(1);
    }

    stats.elapsed = start.elapsed();
    tracing::debug!(?stats, "extracted streams");
    Ok(stats)
}
