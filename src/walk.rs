//! Directory walking across real directories and mounted archives.
//!
//! [`Walk`] behaves like a classic `(dir, dirs, files)` tree walk, except
//! that a file whose physical path is a registered archive is reported as a
//! directory and walking into it descends through the archive's working
//! directory, with paths rewritten back into virtual form.
//!
//! Mount detection only happens while walking real directories. Below an
//! archive root the working directory is walked as is, so an archive loaded
//! from inside another archive's working directory shows up as a plain file
//! there (it is still reachable by walking its own virtual path).

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Error;
use crate::path::{find_longest_match, join_internal, normalize, normalize_path, resolve_physical};
use crate::registry::HandleRegistry;

/// One visited directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Virtual path of the directory
    pub dir: String,
    /// Subdirectory names: real subdirectories first, then mounted archives
    pub dirs: Vec<String>,
    pub files: Vec<String>,
}

type ErrorHandler<'a> = Box<dyn FnMut(Error) + 'a>;
type PruneHandler<'a> = Box<dyn FnMut(&str, &mut Vec<String>) + 'a>;

enum Node<'a> {
    /// A virtual path, not yet matched against the registry
    Virtual(String),
    /// A directory below an archive's working directory
    Archive {
        key: &'a str,
        working_dir: &'a Path,
        real: PathBuf,
    },
}

enum Work<'a> {
    Enter(Node<'a>),
    /// Bottom-up entries wait here until their children are done
    Emit(WalkEntry),
}

/// How to find the children of a listed directory once pruning is done
enum Children<'a> {
    Real {
        base: String,
        mounts: HashSet<String>,
    },
    Archive {
        key: &'a str,
        working_dir: &'a Path,
        real: PathBuf,
        no_recurse: HashSet<String>,
    },
}

impl<'a> Children<'a> {
    fn nodes(self, names: &[String]) -> Vec<Node<'a>> {
        match self {
            Children::Real { base, mounts } => {
                let (archives, plain): (Vec<&String>, Vec<&String>) =
                    names.iter().partition(|name| mounts.contains(*name));
                plain
                    .into_iter()
                    .chain(archives)
                    .map(|name| Node::Virtual(child_path(&base, name)))
                    .collect()
            }
            Children::Archive {
                key,
                working_dir,
                real,
                no_recurse,
            } => names
                .iter()
                .filter(|name| !no_recurse.contains(*name))
                .map(|name| Node::Archive {
                    key,
                    working_dir,
                    real: real.join(name),
                })
                .collect(),
        }
    }
}

/// Lazy walk over a virtual tree.
///
/// Each call to `next` lists at most the directories needed to produce one
/// entry. Directories that cannot be listed are reported to the
/// [`on_error`](Walk::on_error) callback, if any, and skipped.
pub struct Walk<'a> {
    registry: &'a HandleRegistry,
    topdown: bool,
    follow_symlinks: bool,
    on_error: Option<ErrorHandler<'a>>,
    prune: Option<PruneHandler<'a>>,
    stack: Vec<Work<'a>>,
}

impl<'a> Walk<'a> {
    pub fn new(registry: &'a HandleRegistry, top: &str) -> Self {
        Self {
            registry,
            topdown: true,
            follow_symlinks: false,
            on_error: None,
            prune: None,
            stack: vec![Work::Enter(Node::Virtual(normalize(top)))],
        }
    }

    /// Yield a directory before (default) or after its subdirectories
    pub fn topdown(mut self, topdown: bool) -> Self {
        self.topdown = topdown;
        self
    }

    /// Descend into symlinked directories
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Receive the errors of directories that could not be listed
    pub fn on_error(mut self, handler: impl FnMut(Error) + 'a) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    /// Edit the subdirectory list of each directory before it is yielded.
    ///
    /// Only names left in the list are descended into. Top-down walks only;
    /// a bottom-up walk has already visited the children.
    pub fn prune(mut self, prune: impl FnMut(&str, &mut Vec<String>) + 'a) -> Self {
        self.prune = Some(Box::new(prune));
        self
    }

    fn report(&mut self, err: Error) {
        debug!(error = %err, "skipping directory");
        if let Some(handler) = self.on_error.as_mut() {
            handler(err);
        }
    }

    fn expand(&mut self, node: Node<'a>) -> Option<(WalkEntry, Children<'a>)> {
        match node {
            Node::Virtual(path) => match find_longest_match(&path, self.registry) {
                Some(hit) => {
                    let real = join_internal(&hit.handle.working_dir, &hit.internal);
                    self.expand_archive(hit.key, &hit.handle.working_dir, real)
                }
                None => self.expand_real(path),
            },
            Node::Archive {
                key,
                working_dir,
                real,
            } => self.expand_archive(key, working_dir, real),
        }
    }

    fn expand_archive(
        &mut self,
        key: &'a str,
        working_dir: &'a Path,
        real: PathBuf,
    ) -> Option<(WalkEntry, Children<'a>)> {
        let listing = match list_dir(&real) {
            Ok(listing) => listing,
            Err(source) => {
                self.report(Error::ReadDir { path: real, source });
                return None;
            }
        };

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        let mut no_recurse = HashSet::new();

        for item in listing {
            if item.is_dir {
                if item.is_symlink && !self.follow_symlinks {
                    no_recurse.insert(item.name.clone());
                }
                dirs.push(item.name);
            } else {
                files.push(item.name);
            }
        }

        let dir = match real.strip_prefix(working_dir) {
            Ok(rel) if !rel.as_os_str().is_empty() => format!("{key}/{}", normalize_path(rel)),
            _ => key.to_string(),
        };

        Some((
            WalkEntry { dir, dirs, files },
            Children::Archive {
                key,
                working_dir,
                real,
                no_recurse,
            },
        ))
    }

    fn expand_real(&mut self, path: String) -> Option<(WalkEntry, Children<'a>)> {
        let real = resolve_physical(Path::new(&path));
        if !real.is_dir() {
            self.report(Error::NotADirectory { path });
            return None;
        }

        let listing = match list_dir(&real) {
            Ok(listing) => listing,
            Err(source) => {
                self.report(Error::ReadDir { path: real, source });
                return None;
            }
        };

        let mut dirs = Vec::new();
        let mut mounts = Vec::new();
        let mut files = Vec::new();

        for item in listing {
            if item.is_dir && (self.follow_symlinks || !item.is_symlink) {
                dirs.push(item.name);
            } else if self
                .registry
                .contains_key(&normalize_path(&resolve_physical(&real.join(&item.name))))
            {
                mounts.push(item.name);
            } else {
                files.push(item.name);
            }
        }

        let mount_set = mounts.iter().cloned().collect();
        dirs.extend(mounts);

        Some((
            WalkEntry {
                dir: path.clone(),
                dirs,
                files,
            },
            Children::Real {
                base: path,
                mounts: mount_set,
            },
        ))
    }
}

impl Iterator for Walk<'_> {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        while let Some(work) = self.stack.pop() {
            let node = match work {
                Work::Emit(entry) => return Some(entry),
                Work::Enter(node) => node,
            };

            let Some((mut entry, children)) = self.expand(node) else {
                continue;
            };

            if self.topdown {
                if let Some(prune) = self.prune.as_mut() {
                    prune(&entry.dir, &mut entry.dirs);
                }
                let nodes = children.nodes(&entry.dirs);
                self.stack.extend(nodes.into_iter().rev().map(Work::Enter));
                return Some(entry);
            }

            let nodes = children.nodes(&entry.dirs);
            self.stack.push(Work::Emit(entry));
            self.stack.extend(nodes.into_iter().rev().map(Work::Enter));
        }
        None
    }
}

struct Item {
    name: String,
    is_dir: bool,
    is_symlink: bool,
}

/// List `dir`, following symlinks to decide what is a directory
fn list_dir(dir: &Path) -> io::Result<Vec<Item>> {
    let mut items = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_symlink = entry.file_type()?.is_symlink();
        items.push(Item {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: entry.path().is_dir(),
            is_symlink,
        });
    }
    Ok(items)
}

fn child_path(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ArchiveBackend, ZipBackend};
    use crate::config::Config;
    use crate::registry::OpenMode;
    use crate::zip::{DosDateTime, ZipWriter};
    use std::cell::RefCell;
    use std::io::Cursor;

    struct Fixture {
        dir: tempfile::TempDir,
        registry: HandleRegistry,
        backend: ZipBackend,
        key: String,
    }

    impl Fixture {
        /// root/{d/f.txt, plain.txt, pack.zip (loaded: A, B/, B/C), other.zip (not loaded)}
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("root");
            fs::create_dir_all(root.join("d")).unwrap();
            fs::write(root.join("d/f.txt"), b"f").unwrap();
            fs::write(root.join("plain.txt"), b"p").unwrap();

            let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
            writer.add_file("A", &b"alpha"[..], DosDateTime::default()).unwrap();
            writer.add_directory("B/", DosDateTime::default()).unwrap();
            writer.add_file("B/C", &b"gamma"[..], DosDateTime::default()).unwrap();
            let bytes = writer.finish().unwrap().into_inner();
            fs::write(root.join("pack.zip"), &bytes).unwrap();
            fs::write(root.join("other.zip"), &bytes).unwrap();

            let backend = ZipBackend::new(Config::default().temp_dir(dir.path().join("work")));
            let handle = backend
                .open(&root.join("pack.zip"), false, OpenMode::Read)
                .unwrap();
            let key = normalize_path(&handle.archive_path);
            let mut registry = HandleRegistry::new();
            registry.insert(key.clone(), handle);

            Self {
                dir,
                registry,
                backend,
                key,
            }
        }

        fn root(&self) -> String {
            normalize_path(&self.dir.path().join("root"))
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            for (_, handle) in self.registry.drain() {
                let _ = self.backend.close(&handle, false);
            }
        }
    }

    fn sorted(mut names: Vec<String>) -> Vec<String> {
        names.sort();
        names
    }

    #[test]
    fn loaded_archives_appear_as_directories() {
        let fx = Fixture::new();
        let entries: Vec<_> = Walk::new(&fx.registry, &fx.root()).collect();

        let top = &entries[0];
        assert_eq!(top.dir, fx.root());
        assert_eq!(top.dirs, ["d", "pack.zip"]);
        assert_eq!(sorted(top.files.clone()), ["other.zip", "plain.txt"]);

        let pack = entries.iter().find(|e| e.dir == fx.key).unwrap();
        assert_eq!(pack.dirs, ["B"]);
        assert_eq!(pack.files, ["A"]);

        let inner = entries
            .iter()
            .find(|e| e.dir == format!("{}/B", fx.key))
            .unwrap();
        assert!(inner.dirs.is_empty());
        assert_eq!(inner.files, ["C"]);

        let dirs: Vec<_> = entries.iter().map(|e| e.dir.clone()).collect();
        assert_eq!(
            dirs,
            [
                fx.root(),
                format!("{}/d", fx.root()),
                fx.key.clone(),
                format!("{}/B", fx.key)
            ]
        );
    }

    #[test]
    fn bottom_up_yields_children_first() {
        let fx = Fixture::new();
        let dirs: Vec<_> = Walk::new(&fx.registry, &fx.root())
            .topdown(false)
            .map(|e| e.dir)
            .collect();
        assert_eq!(
            dirs,
            [
                format!("{}/d", fx.root()),
                format!("{}/B", fx.key),
                fx.key.clone(),
                fx.root()
            ]
        );
    }

    #[test]
    fn pruning_stops_descent_into_dirs_and_mounts() {
        let fx = Fixture::new();

        let dirs: Vec<_> = Walk::new(&fx.registry, &fx.root())
            .prune(|_, dirs| dirs.retain(|d| d != "pack.zip"))
            .map(|e| e.dir)
            .collect();
        assert_eq!(dirs, [fx.root(), format!("{}/d", fx.root())]);

        let entries: Vec<_> = Walk::new(&fx.registry, &fx.root())
            .prune(|_, dirs| dirs.retain(|d| d != "d"))
            .collect();
        assert_eq!(entries[0].dirs, ["pack.zip"]);
        let dirs: Vec<_> = entries.into_iter().map(|e| e.dir).collect();
        assert_eq!(dirs, [fx.root(), fx.key.clone(), format!("{}/B", fx.key)]);
    }

    #[test]
    fn walking_inside_an_archive_starts_there() {
        let fx = Fixture::new();
        let top = format!("{}/B", fx.key);
        let entries: Vec<_> = Walk::new(&fx.registry, &top).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].dir, top);
        assert_eq!(entries[0].files, ["C"]);
    }

    #[test]
    fn missing_directories_go_to_the_error_callback() {
        let fx = Fixture::new();
        let errors = RefCell::new(Vec::new());
        let missing = format!("{}/nope", fx.root());

        let entries: Vec<_> = Walk::new(&fx.registry, &missing)
            .on_error(|err| errors.borrow_mut().push(err))
            .collect();

        assert!(entries.is_empty());
        let errors = errors.into_inner();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], Error::NotADirectory { path } if *path == missing));

        // Without a callback the walk is simply empty
        assert_eq!(Walk::new(&fx.registry, &missing).count(), 0);
    }

    #[test]
    fn a_file_is_not_walkable() {
        let fx = Fixture::new();
        let file = format!("{}/plain.txt", fx.root());
        let mut reported = 0;
        let count = Walk::new(&fx.registry, &file)
            .on_error(|_| reported += 1)
            .count();
        assert_eq!(count, 0);
        assert_eq!(reported, 1);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_dirs_are_followed_only_on_request() {
        let fx = Fixture::new();
        std::os::unix::fs::symlink(
            fx.dir.path().join("root/d"),
            fx.dir.path().join("root/link"),
        )
        .unwrap();

        let top = Walk::new(&fx.registry, &fx.root()).next().unwrap();
        assert_eq!(top.dirs, ["d", "pack.zip"]);
        assert!(top.files.contains(&"link".to_string()));

        let dirs: Vec<_> = Walk::new(&fx.registry, &fx.root())
            .follow_symlinks(true)
            .map(|e| e.dir)
            .collect();
        assert!(dirs.contains(&format!("{}/link", fx.root())));
    }
}
