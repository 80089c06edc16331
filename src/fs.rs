//! The [`ZipFs`] client: owns the registry and the backend, and exposes the
//! virtual filesystem operations.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::backend::{ArchiveBackend, ZipBackend};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::path::{self, normalize, normalize_path, resolve_physical};
use crate::registry::{Handle, HandleRegistry, OpenMode};
use crate::walk::Walk;

/// A virtual filesystem in which loaded archives behave like directories.
///
/// ### Example:
/// ```no_run
/// use zipfs::{OpenMode, ZipFs};
///
/// let mut fs = ZipFs::new();
/// fs.open("data/pack.zip", false, OpenMode::ReadWrite).unwrap();
/// fs.create_dir_all("data/pack.zip/docs").unwrap();
/// std::fs::write(fs.resolve("data/pack.zip/docs/note.txt").unwrap(), b"hi").unwrap();
///
/// for entry in fs.walk("data") {
///     println!("{} {:?} {:?}", entry.dir, entry.dirs, entry.files);
/// }
/// fs.close("data/pack.zip", true).unwrap();
/// ```
pub struct ZipFs<B: ArchiveBackend = ZipBackend> {
    registry: HandleRegistry,
    backend: B,
    auto_clean: bool,
}

impl ZipFs<ZipBackend> {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let auto_clean = config.auto_clean;
        Self {
            registry: HandleRegistry::new(),
            backend: ZipBackend::new(config),
            auto_clean,
        }
    }
}

impl Default for ZipFs<ZipBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ArchiveBackend> ZipFs<B> {
    pub fn with_backend(backend: B, config: &Config) -> Self {
        Self {
            registry: HandleRegistry::new(),
            backend,
            auto_clean: config.auto_clean,
        }
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    /// Load the archive at `path`; its contents become reachable below it.
    pub fn open(&mut self, path: impl AsRef<Path>, create: bool, mode: OpenMode) -> Result<Handle> {
        let path = path.as_ref();
        let key = registry_key(path);
        if self.registry.contains_key(&key) {
            return Err(Error::AlreadyLoaded {
                path: path.to_path_buf(),
            });
        }

        let handle = self.backend.open(path, create, mode)?;
        self.registry.insert(key, handle.clone());
        Ok(handle)
    }

    /// Unload the archive at `path`, saving changes if `save` is set.
    ///
    /// The archive is unloaded even when saving fails.
    pub fn close(&mut self, path: impl AsRef<Path>, save: bool) -> Result<()> {
        let path = path.as_ref();
        let plain = normalize_path(path);
        let key = if self.registry.contains_key(&plain) {
            plain
        } else {
            registry_key(path)
        };

        let handle = self
            .registry
            .remove(&key)
            .ok_or(Error::NotLoaded { path: key })?;
        self.backend.close(&handle, save)
    }

    /// Close every loaded archive, returning the first error
    pub fn close_all(&mut self, save: bool) -> Result<()> {
        let mut first_err = None;
        for (_, handle) in self.registry.drain() {
            if let Err(err) = self.backend.close(&handle, save) {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub fn is_loaded(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.registry.contains_key(&normalize_path(path))
            || self.registry.contains_key(&registry_key(path))
    }

    pub fn handles(&self) -> impl Iterator<Item = (&str, &Handle)> {
        self.registry.iter()
    }

    /// On-disk location of a virtual path
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        path::resolve(path, &self.registry)
    }

    /// Walk the virtual tree under `top`; see [`Walk`] for the options
    pub fn walk(&self, top: &str) -> Walk<'_> {
        Walk::new(&self.registry, top)
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let real = self.resolve(path)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(real)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    pub fn create_dir(&self, path: &str) -> Result<()> {
        Ok(fs::create_dir(self.resolve(path)?)?)
    }

    pub fn create_dir_all(&self, path: &str) -> Result<()> {
        Ok(fs::create_dir_all(self.resolve(path)?)?)
    }

    pub fn remove_file(&self, path: &str) -> Result<()> {
        Ok(fs::remove_file(self.resolve(path)?)?)
    }

    pub fn remove_dir(&self, path: &str) -> Result<()> {
        Ok(fs::remove_dir(self.resolve(path)?)?)
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        Ok(fs::rename(self.resolve(from)?, self.resolve(to)?)?)
    }

    pub fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.exists())
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.is_dir())
    }

    pub fn is_file(&self, path: &str) -> bool {
        self.resolve(path).is_ok_and(|p| p.is_file())
    }
}

impl<B: ArchiveBackend> Drop for ZipFs<B> {
    fn drop(&mut self) {
        if !self.auto_clean {
            return;
        }
        for (key, handle) in self.registry.drain() {
            warn!(archive = %key, "archive still open on drop, discarding changes");
            let _ = self.backend.close(&handle, false);
        }
    }
}

/// Registry key for an archive path: its normalized physical form
fn registry_key(path: &Path) -> String {
    normalize(&resolve_physical(path).to_string_lossy())
}
