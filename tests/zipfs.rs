//! End-to-end tests through the public `ZipFs` client.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zipfs::path::normalize_path;
use zipfs::zip::{DosDateTime, ZipWriter};
use zipfs::{Config, Error, LocalFileReader, OpenMode, ZipExtractor, ZipFs};

fn client(dir: &TempDir) -> ZipFs {
    ZipFs::with_config(Config::default().temp_dir(dir.path().join("work")))
}

/// A, B/, B/C
fn write_sample(path: &Path) {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.add_file("A", &b"alpha"[..], DosDateTime::default()).unwrap();
    writer.add_directory("B/", DosDateTime::default()).unwrap();
    writer.add_file("B/C", &b"gamma"[..], DosDateTime::default()).unwrap();
    fs::write(path, writer.finish().unwrap().into_inner()).unwrap();
}

fn entry_names(path: &Path) -> Vec<String> {
    let extractor = ZipExtractor::new(LocalFileReader::new(path).unwrap());
    let mut names: Vec<_> = extractor
        .list_files()
        .unwrap()
        .iter()
        .map(zipfs::zip::names::entry_name)
        .collect();
    names.sort();
    names
}

fn working_dirs(dir: &TempDir) -> Vec<PathBuf> {
    match fs::read_dir(dir.path().join("work")) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn round_trip_preserves_entries() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("sample.zip");
    write_sample(&archive);
    let virt = normalize_path(&archive);

    let mut zfs = client(&dir);
    zfs.open(&archive, false, OpenMode::ReadWrite).unwrap();
    assert_eq!(
        fs::read(zfs.resolve(&format!("{virt}/B/C")).unwrap()).unwrap(),
        b"gamma"
    );
    zfs.close(&archive, true).unwrap();

    assert_eq!(entry_names(&archive), ["A", "B/", "B/C"]);
    assert!(working_dirs(&dir).is_empty());

    zfs.open(&archive, false, OpenMode::Read).unwrap();
    assert_eq!(fs::read(zfs.resolve(&format!("{virt}/A")).unwrap()).unwrap(), b"alpha");
    assert!(zfs.is_dir(&format!("{virt}/B")));
    zfs.close(&archive, false).unwrap();
}

#[test]
fn edits_are_saved_only_when_asked() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("sample.zip");
    write_sample(&archive);
    let virt = normalize_path(&archive);

    let mut zfs = client(&dir);
    zfs.open(&archive, false, OpenMode::ReadWrite).unwrap();
    zfs.remove_file(&format!("{virt}/A")).unwrap();
    zfs.close(&archive, false).unwrap();
    assert_eq!(entry_names(&archive), ["A", "B/", "B/C"]);

    zfs.open(&archive, false, OpenMode::ReadWrite).unwrap();
    zfs.remove_file(&format!("{virt}/A")).unwrap();
    zfs.create_dir(&format!("{virt}/D")).unwrap();
    fs::write(zfs.resolve(&format!("{virt}/D/e.txt")).unwrap(), b"new").unwrap();
    zfs.close(&archive, true).unwrap();
    assert_eq!(entry_names(&archive), ["B/", "B/C", "D/", "D/e.txt"]);

    // No temporary archive is left beside the real one
    let siblings: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp_zip"))
        .collect();
    assert!(siblings.is_empty());
}

#[test]
fn legacy_cp932_names_are_recovered_and_saved_as_utf8() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("legacy.zip");

    // "テスト.txt" and "データ/" in CP932, no UTF-8 flag
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .add_file_raw_name(b"\x83\x65\x83\x58\x83\x67.txt", &b"jp"[..], DosDateTime::default())
        .unwrap();
    writer
        .add_file_raw_name(b"\x83\x66\x81\x5B\x83\x5E/a.txt", &b"a"[..], DosDateTime::default())
        .unwrap();
    fs::write(&archive, writer.finish().unwrap().into_inner()).unwrap();

    let virt = normalize_path(&archive);
    let mut zfs = client(&dir);
    zfs.open(&archive, false, OpenMode::ReadWrite).unwrap();

    assert_eq!(
        fs::read(zfs.resolve(&format!("{virt}/テスト.txt")).unwrap()).unwrap(),
        b"jp"
    );
    assert!(zfs.is_file(&format!("{virt}/データ/a.txt")));
    zfs.close(&archive, true).unwrap();

    assert_eq!(entry_names(&archive), ["テスト.txt", "データ/", "データ/a.txt"]);
}

#[test]
fn walk_merges_directories_and_archives() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("docs/readme.txt"), b"r").unwrap();
    write_sample(&root.join("pack.zip"));
    write_sample(&root.join("closed.zip"));

    let mut zfs = client(&dir);
    zfs.open(root.join("pack.zip"), false, OpenMode::Read).unwrap();

    let top = normalize_path(&root);
    let entries: Vec<_> = zfs.walk(&top).collect();
    assert_eq!(entries[0].dir, top);
    assert_eq!(entries[0].dirs, ["docs", "pack.zip"]);
    assert_eq!(entries[0].files, ["closed.zip"]);

    let walked: Vec<_> = entries.iter().map(|e| e.dir.rsplit('/').next().unwrap()).collect();
    assert_eq!(walked, ["root", "docs", "pack.zip", "B"]);

    let pack = &entries[2];
    assert_eq!(pack.dirs, ["B"]);
    assert_eq!(pack.files, ["A"]);

    // Pruning the mount keeps the walk out of the archive
    let pruned: Vec<_> = zfs
        .walk(&top)
        .prune(|_, dirs| dirs.retain(|d| !d.ends_with(".zip")))
        .map(|e| e.dir)
        .collect();
    assert_eq!(pruned, [top.clone(), format!("{top}/docs")]);

    zfs.close_all(false).unwrap();
}

#[test]
fn archive_inside_an_archive_resolves_to_the_inner_one() {
    let dir = tempfile::tempdir().unwrap();
    let inner_bytes = {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.add_file("x.txt", &b"inner"[..], DosDateTime::default()).unwrap();
        writer.finish().unwrap().into_inner()
    };
    let outer = dir.path().join("outer.zip");
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.add_file("inner.zip", &inner_bytes[..], DosDateTime::default()).unwrap();
    writer.add_file("x.txt", &b"outer"[..], DosDateTime::default()).unwrap();
    fs::write(&outer, writer.finish().unwrap().into_inner()).unwrap();

    let mut zfs = client(&dir);
    zfs.open(&outer, false, OpenMode::Read).unwrap();

    let outer_virt = normalize_path(&outer);
    let inner_real = zfs.resolve(&format!("{outer_virt}/inner.zip")).unwrap();
    assert!(inner_real.is_file());
    zfs.open(&inner_real, false, OpenMode::Read).unwrap();

    let inner_virt = normalize_path(&inner_real);
    assert_eq!(
        fs::read(zfs.resolve(&format!("{inner_virt}/x.txt")).unwrap()).unwrap(),
        b"inner"
    );
    assert_eq!(
        fs::read(zfs.resolve(&format!("{outer_virt}/x.txt")).unwrap()).unwrap(),
        b"outer"
    );

    zfs.close(&inner_real, false).unwrap();
    zfs.close(&outer, false).unwrap();
    assert!(working_dirs(&dir).is_empty());
}

#[test]
fn unloaded_archives_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("sample.zip");
    write_sample(&archive);

    let zfs = client(&dir);
    let path = format!("{}/A", normalize_path(&archive));
    match zfs.resolve(&path) {
        Err(Error::ArchiveNotLoaded { archive: name, .. }) => {
            assert_eq!(name, normalize_path(&archive));
        }
        other => panic!("expected ArchiveNotLoaded, got {other:?}"),
    }
}

#[test]
fn broken_archives_fail_to_open_without_leftovers() {
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("broken.zip");
    fs::write(&archive, b"definitely not a zip file").unwrap();

    let mut zfs = client(&dir);
    let err = zfs.open(&archive, false, OpenMode::Read).unwrap_err();
    assert!(matches!(err, Error::InvalidArchive { .. }));
    assert!(!zfs.is_loaded(&archive));
    assert!(working_dirs(&dir).is_empty());

    let err = zfs
        .open(dir.path().join("missing.zip"), false, OpenMode::Read)
        .unwrap_err();
    assert!(matches!(err, Error::ArchiveNotFound { .. }));
}
