//! Open archives keyed by their normalized path.
//!
//! The registry is a plain value owned by the caller (normally through
//! [`ZipFs`](crate::ZipFs)). It is not synchronized; share it across threads
//! only behind your own lock.

use std::collections::HashMap;
use std::path::PathBuf;

/// How an archive was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    Read,
    #[default]
    ReadWrite,
}

/// An open archive and the directory holding its extracted contents.
///
/// The working directory belongs to the handle: it is created by
/// `open` and removed by `close`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub archive_path: PathBuf,
    pub working_dir: PathBuf,
    pub mode: OpenMode,
}

impl Handle {
    pub fn is_writable(&self) -> bool {
        self.mode == OpenMode::ReadWrite
    }
}

/// Map from normalized archive path to its [`Handle`]
#[derive(Debug, Default)]
pub struct HandleRegistry {
    handles: HashMap<String, Handle>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `key`, returning any handle it replaces
    pub fn insert(&mut self, key: impl Into<String>, handle: Handle) -> Option<Handle> {
        self.handles.insert(key.into(), handle)
    }

    pub fn remove(&mut self, key: &str) -> Option<Handle> {
        self.handles.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Handle> {
        self.handles.get(key)
    }

    /// The stored key and handle for `key`
    pub fn get_entry(&self, key: &str) -> Option<(&str, &Handle)> {
        self.handles
            .get_key_value(key)
            .map(|(k, h)| (k.as_str(), h))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.handles.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Handle)> {
        self.handles.iter().map(|(k, h)| (k.as_str(), h))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Remove and return every handle
    pub fn drain(&mut self) -> Vec<(String, Handle)> {
        self.handles.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> Handle {
        Handle {
            archive_path: PathBuf::from(name),
            working_dir: PathBuf::from(format!("/tmp/work-{name}")),
            mode: OpenMode::Read,
        }
    }

    #[test]
    fn insert_get_remove() {
        let mut registry = HandleRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.insert("a.zip", handle("a.zip")).is_none());
        assert!(registry.contains_key("a.zip"));
        assert_eq!(registry.get("a.zip").unwrap().archive_path, PathBuf::from("a.zip"));
        assert!(!registry.get("a.zip").unwrap().is_writable());

        assert_eq!(registry.remove("a.zip"), Some(handle("a.zip")));
        assert!(registry.get("a.zip").is_none());
    }

    #[test]
    fn registries_are_independent() {
        let mut first = HandleRegistry::new();
        let second = HandleRegistry::new();
        first.insert("a.zip", handle("a.zip"));
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn drain_empties_registry() {
        let mut registry = HandleRegistry::new();
        registry.insert("a.zip", handle("a.zip"));
        registry.insert("b.zip", handle("b.zip"));

        let mut keys: Vec<_> = registry.drain().into_iter().map(|(k, _)| k).collect();
        keys.sort();
        assert_eq!(keys, ["a.zip", "b.zip"]);
        assert!(registry.is_empty());
    }
}
