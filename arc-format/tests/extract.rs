#![cfg(feature = "zstd")]

mod common;

use std::fs;
use std::io::Cursor;

use arc_format::extract::{extract_file, extract_files, extract_streams, file_output_path};
use arc_format::{ArcFile, ExtractError, ExtractOptions, HashRegistry, NoProgress, Progress};
use common::*;

fn open() -> ArcFile<Cursor<Vec<u8>>> {
    ArcFile::from_reader(Cursor::new(build_archive(false))).unwrap()
}

#[derive(Default)]
struct Recorder {
    total: u64,
    done: u64,
    messages: Vec<String>,
}

impl Progress for Recorder {
    fn set_total(&mut self, total: u64) {
        self.total = total;
    }

    fn report_add(&mut self, delta: u64) {
        self.done += delta;
    }

    fn log_message(&mut self, message: &str) {
        self.messages.push(message.to_string());
    }
}

#[test]
fn extracts_files_and_isolates_failures() {
    let mut arc = open();
    let registry = HashRegistry::from_seed(
        arc.checksums(),
        [FILES[0].0, FILES[1].0, FILES[3].0, FILES[7].0, PARENT],
    );
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");

    let options = ExtractOptions {
        quarantine: true,
        ..Default::default()
    };
    let mut progress = Recorder::default();
    let stats = extract_files(&mut arc, &registry, &out, &options, &mut progress).unwrap();

    assert_eq!(stats.files_extracted, 5);
    assert_eq!(stats.failures, 3);
    assert_eq!(stats.quarantined, 1);
    assert_eq!(
        stats.bytes_written,
        (MODEL.len() * 2 + texture().len() + REDIRECTED.len()) as u64
    );
    assert_eq!(progress.total, FILES.len() as u64);
    assert_eq!(progress.done, FILES.len() as u64);
    assert_eq!(progress.messages.len(), 3);
    assert!(progress.messages[2].starts_with("File index 0x00007 Offset 0x"));
    assert!(progress.messages[2].ends_with("Can't decompress fighter/mario/zz.bin"));

    let mario = out.join("fighter").join("mario");
    assert_eq!(fs::read(mario.join("model.numdlb")).unwrap(), MODEL);
    assert_eq!(fs::read(mario.join("body.nutexb")).unwrap(), texture());
    assert_eq!(fs::read(mario.join("00002")).unwrap(), MODEL);
    assert_eq!(fs::read(mario.join("shared.bin")).unwrap(), REDIRECTED);
    assert!(fs::read(mario.join("00004")).unwrap().is_empty());
    assert!(!mario.join("zz.bin").exists());
    assert!(!mario.join("00005").exists());
    assert_eq!(fs::read(out.join("bad").join("7")).unwrap(), JUNK);
}

#[test]
fn unnamed_fallbacks() {
    let arc = open();
    let registry = HashRegistry::default();
    assert_eq!(file_output_path(arc.primary(), &registry, 2), "_/00002");

    let registry = HashRegistry::from_seed(arc.checksums(), [PARENT]);
    assert_eq!(
        file_output_path(arc.primary(), &registry, 2),
        "fighter/mario/00002"
    );
}

#[test]
fn existing_files_are_kept_without_overwrite() {
    let mut arc = open();
    let registry = HashRegistry::from_seed(arc.checksums(), [FILES[0].0]);
    let dir = tempfile::tempdir().unwrap();

    let target = dir.path().join("fighter").join("mario").join("model.numdlb");
    fs::create_dir_all(target.parent().unwrap()).unwrap();
    fs::write(&target, b"keep").unwrap();

    let options = ExtractOptions {
        overwrite: false,
        ..Default::default()
    };
    assert_eq!(
        extract_file(&mut arc, &registry, 0, dir.path(), &options).unwrap(),
        0
    );
    assert_eq!(fs::read(&target).unwrap(), b"keep");

    let written = extract_file(&mut arc, &registry, 0, dir.path(), &ExtractOptions::default())
        .unwrap();
    assert_eq!(written, MODEL.len() as u64);
    assert_eq!(fs::read(&target).unwrap(), MODEL);
}

#[test]
fn single_file_errors_are_returned() {
    let mut arc = open();
    let registry = HashRegistry::default();
    let dir = tempfile::tempdir().unwrap();

    let result = extract_file(&mut arc, &registry, 5, dir.path(), &ExtractOptions::default());
    assert!(matches!(result, Err(ExtractError::ReadFailed(_, 5, _))));
}

#[test]
fn extracts_streams() {
    let mut arc = open();
    let dir = tempfile::tempdir().unwrap();

    let registry = HashRegistry::from_seed(arc.checksums(), [STREAM_NAME]);
    let stats = extract_streams(&mut arc, &registry, dir.path(), &mut NoProgress).unwrap();
    assert_eq!(stats.files_extracted, 1);
    let path = dir.path().join("sound").join("bgm").join("title.nus3audio");
    assert_eq!(fs::read(path).unwrap(), STREAM);

    let unnamed = tempfile::tempdir().unwrap();
    extract_streams(&mut arc, &HashRegistry::default(), unnamed.path(), &mut NoProgress).unwrap();
    assert_eq!(fs::read(unnamed.path().join("0000")).unwrap(), STREAM);
}
