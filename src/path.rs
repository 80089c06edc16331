//! Virtual path handling.
//!
//! A virtual path is a `/`-separated string. It is either an ordinary
//! filesystem path or `<archive>/<internal>`, where `<archive>` is a key of
//! the [`HandleRegistry`]. The registry key is the archive's normalized
//! absolute path; an archive loaded from inside another archive's working
//! directory is keyed by its path in there.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::registry::{Handle, HandleRegistry};

/// A registry hit for a virtual path
#[derive(Debug, Clone)]
pub struct Match<'r> {
    pub key: &'r str,
    pub handle: &'r Handle,
    /// Remainder of the path below the archive, `/`-joined
    pub internal: String,
}

/// Replace backslash separators with forward slashes.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// Normalized string form of a filesystem path
pub fn normalize_path(path: &Path) -> String {
    normalize(&path.to_string_lossy())
}

/// Split at the first component ending in `.zip` (any case).
///
/// `"data/a.zip/x/y"` gives `(Some("data/a.zip"), "x/y")`. A path without
/// such a component comes back unchanged as `(None, path)`.
pub fn split_archive_path(path: &str) -> (Option<String>, String) {
    let norm = normalize(path);
    let parts: Vec<&str> = norm.split('/').collect();

    for (i, part) in parts.iter().enumerate() {
        if part.to_ascii_lowercase().ends_with(".zip") {
            return (Some(parts[..=i].join("/")), parts[i + 1..].join("/"));
        }
    }

    (None, path.to_string())
}

/// Find the registered archive covering the most leading components of `path`.
///
/// Prefixes are tried longest first, first as plain strings (cheap, and
/// lets relative keys match) and then resolved to absolute physical paths.
pub fn find_longest_match<'r>(path: &str, registry: &'r HandleRegistry) -> Option<Match<'r>> {
    let norm = normalize(path);
    let parts: Vec<&str> = norm.split('/').collect();
    let prefix = |i: usize| parts[..i].join("/");

    let by_string = (1..=parts.len())
        .rev()
        .find_map(|i| registry.get_entry(&prefix(i)).map(|hit| (hit, i)));

    let hit = by_string.or_else(|| {
        (1..=parts.len()).rev().find_map(|i| {
            let candidate = prefix(i);
            if candidate.is_empty() {
                return None;
            }
            let physical = normalize_path(&resolve_physical(Path::new(&candidate)));
            registry.get_entry(&physical).map(|hit| (hit, i))
        })
    });

    hit.map(|((key, handle), i)| Match {
        key,
        handle,
        internal: parts[i..].join("/"),
    })
}

/// Translate a virtual path into the on-disk path it denotes.
///
/// Paths inside a loaded archive map into its working directory. A path
/// that looks like it points into an archive which is not loaded is an
/// error. Anything else resolves to its absolute physical path.
pub fn resolve(path: &str, registry: &HandleRegistry) -> Result<PathBuf> {
    if let Some(hit) = find_longest_match(path, registry) {
        return Ok(join_internal(&hit.handle.working_dir, &hit.internal));
    }

    if let (Some(archive), _) = split_archive_path(path) {
        return Err(Error::ArchiveNotLoaded {
            archive,
            path: path.to_string(),
        });
    }

    Ok(resolve_physical(Path::new(path)))
}

/// Join a `/`-separated internal path onto a working directory
pub fn join_internal(working_dir: &Path, internal: &str) -> PathBuf {
    let mut real = working_dir.to_path_buf();
    for part in internal.split('/').filter(|p| !p.is_empty()) {
        real.push(part);
    }
    real
}

/// Absolute physical form of `path`, whether or not it exists.
///
/// The deepest existing ancestor is canonicalized, so symlinks along it are
/// resolved; the rest is appended lexically with `.` dropped and `..`
/// popping a component.
pub fn resolve_physical(path: &Path) -> PathBuf {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    if let Ok(real) = path.canonicalize() {
        return real;
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    let mut base = loop {
        match existing.canonicalize() {
            Ok(real) => break real,
            Err(_) => match (existing.parent(), existing.components().next_back()) {
                (Some(parent), Some(last)) => {
                    rest.push(last.as_os_str().to_os_string());
                    existing = parent;
                }
                // the root itself cannot be canonicalized
                _ => break lexical(existing),
            },
        }
    };

    for name in rest.into_iter().rev() {
        match Path::new(&name).components().next() {
            Some(Component::ParentDir) => {
                base.pop();
            }
            Some(Component::CurDir) | None => {}
            _ => base.push(name),
        }
    }
    base
}

fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}
