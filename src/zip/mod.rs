//! ZIP archive reading and writing.
//!
//! This module provides functionality for reading, extracting and
//! re-creating ZIP archives, supporting the standard ZIP format and, for
//! reading, the ZIP64 extensions used by large archives.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`extractor`]: Entry decompression and whole-archive extraction
//! - [`writer`]: Streaming archive creation
//! - [`names`]: Entry name correction for legacy code pages
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions when reading
//! - STORED (no compression) and DEFLATE methods
//! - CP437 names, with CP932 recovery for archives from Japanese Windows
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods
//! - No ZIP64 when writing

pub mod cp437;
mod extractor;
pub mod names;
mod parser;
mod structures;
mod writer;

pub use extractor::ZipExtractor;
pub use names::decode_entry_name;
pub use parser::ZipParser;
pub use structures::*;
pub use writer::{DosDateTime, ZipWriter};

