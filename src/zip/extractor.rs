use flate2::CrcReader;
use flate2::read::DeflateDecoder;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::names;
use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files()
    }

    /// Open a decompressing reader over one entry.
    ///
    /// The reader fails at end of stream if the CRC-32 or size does not
    /// match the Central Directory.
    pub fn open_entry(&self, entry: &ZipFileEntry) -> Result<Box<dyn Read + '_>> {
        if entry.is_encrypted() {
            bail!("Encrypted entries are not supported: {}", entry.file_name);
        }

        let data_offset = self.parser.get_data_offset(entry)?;
        let raw = SectionReader {
            reader: self.parser.reader(),
            pos: data_offset,
            end: data_offset + entry.compressed_size,
        };

        let decoded: Box<dyn Read + '_> = match entry.compression_method {
            CompressionMethod::Stored => Box::new(raw),
            CompressionMethod::Deflate => Box::new(DeflateDecoder::new(raw)),
            CompressionMethod::Unknown(method) => {
                bail!(
                    "Unsupported compression method {} for {}",
                    method,
                    entry.file_name
                );
            }
        };

        Ok(Box::new(VerifyingReader {
            inner: CrcReader::new(decoded),
            expected_crc: entry.crc32,
            expected_size: entry.uncompressed_size,
        }))
    }

    /// Extract file data to memory
    pub fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(entry.uncompressed_size.min(1 << 20) as usize);
        self.open_entry(entry)?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Extract file to disk, returning the number of bytes written
    pub fn extract_to_file(&self, entry: &ZipFileEntry, output_path: &Path) -> Result<u64> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Both handles are released before the next entry is touched
        let mut source = self.open_entry(entry)?;
        let mut file = fs::File::create(output_path)?;
        let written = io::copy(&mut source, &mut file)?;

        Ok(written)
    }

    /// Extract every entry below `dest`, correcting legacy entry names.
    ///
    /// Returns the number of entries extracted.
    pub fn extract_all(&self, dest: &Path) -> Result<usize> {
        let entries = self.list_files()?;

        for entry in &entries {
            let name = names::entry_name(entry);
            let relative = entry_path(&name)?;
            let output_path = dest.join(&relative);

            if name.ends_with('/') {
                fs::create_dir_all(&output_path)
                    .with_context(|| format!("creating directory {}", output_path.display()))?;
            } else {
                let written = self
                    .extract_to_file(entry, &output_path)
                    .with_context(|| format!("extracting {}", name))?;
                tracing::trace!(entry = %name, bytes = written, "extracted");
            }
        }

        Ok(entries.len())
    }
}

/// Turn an entry name into a path relative to the extraction root.
///
/// Leading separators and `.` components are dropped; `..` is refused.
fn entry_path(name: &str) -> Result<PathBuf> {
    let mut path = PathBuf::new();
    for part in name.split('/') {
        match part {
            "" | "." => continue,
            ".." => bail!("Entry escapes the extraction directory: {}", name),
            _ => path.push(part),
        }
    }
    if path.as_os_str().is_empty() && !name.ends_with('/') {
        bail!("Entry has an empty name");
    }
    Ok(path)
}

/// Reads the byte range `pos..end` of a [`ReadAt`] source
struct SectionReader<'a, R: ReadAt> {
    reader: &'a R,
    pos: u64,
    end: u64,
}

impl<R: ReadAt> Read for SectionReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.end.saturating_sub(self.pos);
        let len = (buf.len() as u64).min(remaining) as usize;
        if len == 0 {
            return Ok(0);
        }
        let n = self
            .reader
            .read_at(self.pos, &mut buf[..len])
            .map_err(io::Error::other)?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        self.pos += n as u64;
        Ok(n)
    }
}

struct VerifyingReader<R: Read> {
    inner: CrcReader<R>,
    expected_crc: u32,
    expected_size: u64,
}

impl<R: Read> Read for VerifyingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            let crc = self.inner.crc();
            if crc.sum() != self.expected_crc || crc.amount() != self.expected_size as u32 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "CRC-32 or size mismatch",
                ));
            }
        }
        Ok(n)
    }
}
