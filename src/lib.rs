//! # zipfs
//!
//! Mount ZIP archives as directories behind ordinary slash-separated paths.
//!
//! Opening an archive extracts it into a private working directory and
//! registers it under its absolute path. From then on `.../pack.zip/docs/a.txt`
//! resolves into that working directory, and a directory walk treats the
//! archive file as a directory. Closing the archive can pack the working
//! directory back into the ZIP file, replacing it atomically.
//!
//! ## Features
//!
//! - Path resolution with longest-match lookup, so archives opened from
//!   inside other archives resolve to the innermost one
//! - Lazy `(dir, dirs, files)` walks that merge real directories with
//!   mounted archives, top-down or bottom-up, with pruning
//! - Recovery of CP932 (Shift_JIS) entry names from archives made by legacy
//!   Windows tools
//! - Support for ZIP64 archives when reading
//!
//! ## Example
//!
//! ```no_run
//! use zipfs::{OpenMode, ZipFs};
//!
//! fn main() -> zipfs::Result<()> {
//!     let mut fs = ZipFs::new();
//!     fs.open("backup.zip", false, OpenMode::Read)?;
//!
//!     for entry in fs.walk(".") {
//!         for file in &entry.files {
//!             println!("{}/{}", entry.dir, file);
//!         }
//!     }
//!
//!     fs.close("backup.zip", false)
//! }
//! ```
//!
//! The registry is a plain value inside [`ZipFs`]; nothing here is
//! synchronized or global.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod io;
pub mod path;
pub mod registry;
pub mod walk;
pub mod zip;

pub use backend::{ArchiveBackend, ZipBackend};
pub use cli::Cli;
pub use config::Config;
pub use error::{Error, Result};
pub use fs::ZipFs;
pub use io::{LocalFileReader, ReadAt};
pub use registry::{Handle, HandleRegistry, OpenMode};
pub use walk::{Walk, WalkEntry};
pub use zip::{ZipExtractor, ZipFileEntry};
