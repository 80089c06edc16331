use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("archive not found: {}", path.display())]
    ArchiveNotFound { path: PathBuf },

    #[error("not a valid archive: {}: {source:#}", path.display())]
    InvalidArchive {
        path: PathBuf,
        source: anyhow::Error,
    },

    #[error("archive '{archive}' is not loaded (or path '{path}' is invalid)")]
    ArchiveNotLoaded { archive: String, path: String },

    #[error("archive already loaded: {}", path.display())]
    AlreadyLoaded { path: PathBuf },

    #[error("no archive loaded at '{path}'")]
    NotLoaded { path: String },

    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    #[error("failed to list directory {}: {source}", path.display())]
    ReadDir { path: PathBuf, source: io::Error },

    #[error("failed to rewrite archive {}: {source}", path.display())]
    Rewrite { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
