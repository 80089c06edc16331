//! Archive open/close.
//!
//! Opening extracts the whole archive into a private working directory;
//! closing optionally packs that directory back into the archive and then
//! removes it.

use std::fs;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::io::LocalFileReader;
use crate::path::resolve_physical;
use crate::registry::{Handle, OpenMode};
use crate::zip::{DosDateTime, ZipExtractor, ZipWriter};

/// Storage behind a mounted archive
pub trait ArchiveBackend {
    /// Materialize the archive at `path` into a fresh working directory.
    ///
    /// With `create`, a missing archive is not an error: the working
    /// directory starts empty and the archive appears on the first saving
    /// close.
    fn open(&self, path: &Path, create: bool, mode: OpenMode) -> Result<Handle>;

    /// Release `handle`, writing the working directory back first when
    /// `save` is set and the handle is writable.
    ///
    /// The working directory is removed whatever the outcome.
    fn close(&self, handle: &Handle, save: bool) -> Result<()>;
}

/// [`ArchiveBackend`] for ZIP files
#[derive(Debug, Clone, Default)]
pub struct ZipBackend {
    config: Config,
}

impl ZipBackend {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn create_working_dir(&self) -> Result<PathBuf> {
        let root = self.config.working_root();
        fs::create_dir_all(&root)?;
        let dir = tempfile::Builder::new()
            .prefix(&self.config.prefix)
            .tempdir_in(&root)?;
        Ok(dir.keep())
    }

    fn extract(archive_path: &Path, working_dir: &Path) -> Result<()> {
        let reader = LocalFileReader::new(archive_path).map_err(|source| Error::InvalidArchive {
            path: archive_path.to_path_buf(),
            source,
        })?;
        let extractor = ZipExtractor::new(reader);

        // Validate before touching the working directory
        extractor.list_files().map_err(|source| Error::InvalidArchive {
            path: archive_path.to_path_buf(),
            source,
        })?;

        let count = extractor
            .extract_all(working_dir)
            .map_err(|source| Error::InvalidArchive {
                path: archive_path.to_path_buf(),
                source,
            })?;
        debug!(archive = %archive_path.display(), entries = count, "extracted archive");
        Ok(())
    }

    /// Pack `working_dir` into a temporary file beside `archive_path`, then
    /// rename it over the archive.
    fn rewrite(archive_path: &Path, working_dir: &Path) -> io::Result<()> {
        let parent = archive_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent)?;

        // Dropping an unpersisted temporary file deletes it
        let mut temp = tempfile::Builder::new()
            .prefix(".zipfs-")
            .suffix(".tmp_zip")
            .tempfile_in(parent)?;

        let mut writer = ZipWriter::new(BufWriter::new(temp.as_file_mut()));
        let entries = pack_dir(&mut writer, working_dir)?;
        writer.finish()?.into_inner().map_err(|e| e.into_error())?;

        temp.persist(archive_path).map_err(|e| e.error)?;
        debug!(archive = %archive_path.display(), entries, "rewrote archive");
        Ok(())
    }
}

impl ArchiveBackend for ZipBackend {
    fn open(&self, path: &Path, create: bool, mode: OpenMode) -> Result<Handle> {
        let archive_path = resolve_physical(path);
        let exists = archive_path.exists();

        if !exists && !create {
            return Err(Error::ArchiveNotFound { path: path.to_path_buf() });
        }

        let working_dir = self.create_working_dir()?;

        if exists {
            if let Err(err) = Self::extract(&archive_path, &working_dir) {
                remove_working_dir(&working_dir);
                return Err(err);
            }
        }

        debug!(
            archive = %archive_path.display(),
            working_dir = %working_dir.display(),
            ?mode,
            created = !exists,
            "opened archive"
        );

        Ok(Handle {
            archive_path,
            working_dir,
            mode,
        })
    }

    fn close(&self, handle: &Handle, save: bool) -> Result<()> {
        let result = if save && handle.is_writable() && handle.working_dir.exists() {
            Self::rewrite(&handle.archive_path, &handle.working_dir).map_err(|source| {
                Error::Rewrite {
                    path: handle.archive_path.clone(),
                    source,
                }
            })
        } else {
            Ok(())
        };

        remove_working_dir(&handle.working_dir);
        debug!(archive = %handle.archive_path.display(), save, "closed archive");
        result
    }
}

/// Best-effort recursive removal
fn remove_working_dir(dir: &Path) {
    if let Err(err) = fs::remove_dir_all(dir) {
        if err.kind() != io::ErrorKind::NotFound {
            warn!(dir = %dir.display(), error = %err, "failed to remove working directory");
        }
    }
}

/// Add everything below `root` to `writer` in file name order.
///
/// Symlinks are not followed: a link to a file is stored with the target's
/// content, a link to a directory (or a dangling one) is skipped.
fn pack_dir<W: io::Write + io::Seek>(writer: &mut ZipWriter<W>, root: &Path) -> io::Result<usize> {
    let mut count = 0;
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1)
    {
        let entry = entry?;
        let path = entry.path();
        let name = entry_name(root, path)?;

        let metadata = if entry.path_is_symlink() {
            match fs::metadata(path) {
                Ok(target) if target.is_file() => target,
                _ => {
                    debug!(path = %path.display(), "skipping symlink");
                    continue;
                }
            }
        } else {
            entry.metadata()?
        };
        let modified = metadata
            .modified()
            .map(DosDateTime::from_system_time)
            .unwrap_or_default();

        if metadata.is_dir() {
            writer.add_directory(&format!("{name}/"), modified)?;
        } else {
            writer.add_file(&name, fs::File::open(path)?, modified)?;
        }
        count += 1;
    }
    Ok(count)
}

/// `/`-joined name of `path` relative to `root`; names that are not UTF-8
/// are refused rather than mangled
fn entry_name(root: &Path, path: &Path) -> io::Result<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component.as_os_str().to_str().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file name is not valid UTF-8: {}", path.display()),
            )
        })?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}
