//! Streaming ZIP writer.
//!
//! Each file is deflated straight into the output; the CRC-32 and sizes
//! are patched into its Local File Header afterwards, which is why the
//! output must be seekable. ZIP64 is never written: an archive or entry
//! past 4 GiB is reported as an error instead.

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{Datelike, Local, Timelike};
use flate2::write::DeflateEncoder;
use flate2::{Compression, CrcReader};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::time::SystemTime;

use super::structures::*;

/// Version 2.0: deflate and directories
const VERSION_NEEDED: u16 = 20;

/// Host system Unix (3) in the upper byte, spec version 2.0 in the lower
const VERSION_MADE_BY: u16 = (3 << 8) | VERSION_NEEDED;

const FILE_ATTRIBUTES: u32 = 0o100644 << 16;
const DIRECTORY_ATTRIBUTES: u32 = (0o40755 << 16) | 0x10;

/// A modification timestamp in MS-DOS (time, date) form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// Convert using the local time zone, the way DOS-era tools did
    pub fn from_system_time(time: SystemTime) -> Self {
        let local = chrono::DateTime::<Local>::from(time);
        let (time, date) = dos_datetime(
            local.year(),
            local.month(),
            local.day(),
            local.hour(),
            local.minute(),
            local.second(),
        );
        Self { time, date }
    }
}

impl Default for DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable instant
    fn default() -> Self {
        Self {
            time: 0,
            date: (1 << 5) | 1,
        }
    }
}

struct CentralEntry {
    name: Vec<u8>,
    flags: u16,
    method: CompressionMethod,
    modified: DosDateTime,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    lfh_offset: u32,
    external_attrs: u32,
}

/// ZIP archive writer over any seekable output
pub struct ZipWriter<W: Write + Seek> {
    inner: W,
    entries: Vec<CentralEntry>,
}

impl<W: Write + Seek> ZipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            entries: Vec::new(),
        }
    }

    /// Add a deflate-compressed file, streaming its content from `source`.
    ///
    /// The UTF-8 flag is set only for names that are not plain ASCII.
    pub fn add_file<R: Read>(&mut self, name: &str, source: R, modified: DosDateTime) -> io::Result<()> {
        let flags = if name.is_ascii() { 0 } else { FLAG_UTF8 };
        self.write_file(name.as_bytes().to_vec(), flags, source, modified)
    }

    /// Add a file whose name is stored byte for byte, without the UTF-8 flag.
    ///
    /// This reproduces archives made by tools that store names in a legacy
    /// code page.
    pub fn add_file_raw_name<R: Read>(&mut self, name: &[u8], source: R, modified: DosDateTime) -> io::Result<()> {
        self.write_file(name.to_vec(), 0, source, modified)
    }

    /// Add a directory entry. `name` must end with `/`.
    pub fn add_directory(&mut self, name: &str, modified: DosDateTime) -> io::Result<()> {
        if !name.ends_with('/') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("directory entry name must end with '/': {name}"),
            ));
        }
        let flags = if name.is_ascii() { 0 } else { FLAG_UTF8 };
        let lfh_offset = to_u32(self.inner.stream_position()?)?;
        let entry = CentralEntry {
            name: name.as_bytes().to_vec(),
            flags,
            method: CompressionMethod::Stored,
            modified,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            lfh_offset,
            external_attrs: DIRECTORY_ATTRIBUTES,
        };
        self.write_local_header(&entry)?;
        self.entries.push(entry);
        Ok(())
    }

    fn write_file<R: Read>(&mut self, name: Vec<u8>, flags: u16, source: R, modified: DosDateTime) -> io::Result<()> {
        let lfh_start = self.inner.stream_position()?;
        let mut entry = CentralEntry {
            name,
            flags,
            method: CompressionMethod::Deflate,
            modified,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            lfh_offset: to_u32(lfh_start)?,
            external_attrs: FILE_ATTRIBUTES,
        };
        self.write_local_header(&entry)?;

        let data_start = self.inner.stream_position()?;
        let mut source = CrcReader::new(source);
        let mut encoder = DeflateEncoder::new(&mut self.inner, Compression::default());
        let uncompressed = io::copy(&mut source, &mut encoder)?;
        encoder.finish()?;
        let data_end = self.inner.stream_position()?;

        entry.crc32 = source.crc().sum();
        entry.compressed_size = to_u32(data_end - data_start)?;
        entry.uncompressed_size = to_u32(uncompressed)?;

        // Patch CRC-32, compressed and uncompressed sizes
        self.inner.seek(SeekFrom::Start(lfh_start + LFH_CRC_OFFSET))?;
        self.inner.write_u32::<LittleEndian>(entry.crc32)?;
        self.inner.write_u32::<LittleEndian>(entry.compressed_size)?;
        self.inner.write_u32::<LittleEndian>(entry.uncompressed_size)?;
        self.inner.seek(SeekFrom::Start(data_end))?;

        self.entries.push(entry);
        Ok(())
    }

    fn write_local_header(&mut self, entry: &CentralEntry) -> io::Result<()> {
        let out = &mut self.inner;
        out.write_all(LFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(entry.flags)?;
        out.write_u16::<LittleEndian>(entry.method.as_u16())?;
        out.write_u16::<LittleEndian>(entry.modified.time)?;
        out.write_u16::<LittleEndian>(entry.modified.date)?;
        out.write_u32::<LittleEndian>(entry.crc32)?;
        out.write_u32::<LittleEndian>(entry.compressed_size)?;
        out.write_u32::<LittleEndian>(entry.uncompressed_size)?;
        out.write_u16::<LittleEndian>(name_len(&entry.name)?)?;
        out.write_u16::<LittleEndian>(0)?; // extra field length
        out.write_all(&entry.name)?;
        Ok(())
    }

    /// Write the Central Directory and EOCD, returning the output
    pub fn finish(mut self) -> io::Result<W> {
        let cd_offset = self.inner.stream_position()?;

        for entry in &self.entries {
            let out = &mut self.inner;
            out.write_all(CDFH_SIGNATURE)?;
            out.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
            out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
            out.write_u16::<LittleEndian>(entry.flags)?;
            out.write_u16::<LittleEndian>(entry.method.as_u16())?;
            out.write_u16::<LittleEndian>(entry.modified.time)?;
            out.write_u16::<LittleEndian>(entry.modified.date)?;
            out.write_u32::<LittleEndian>(entry.crc32)?;
            out.write_u32::<LittleEndian>(entry.compressed_size)?;
            out.write_u32::<LittleEndian>(entry.uncompressed_size)?;
            out.write_u16::<LittleEndian>(name_len(&entry.name)?)?;
            out.write_u16::<LittleEndian>(0)?; // extra field length
            out.write_u16::<LittleEndian>(0)?; // comment length
            out.write_u16::<LittleEndian>(0)?; // disk number start
            out.write_u16::<LittleEndian>(0)?; // internal attributes
            out.write_u32::<LittleEndian>(entry.external_attrs)?;
            out.write_u32::<LittleEndian>(entry.lfh_offset)?;
            out.write_all(&entry.name)?;
        }

        let cd_end = self.inner.stream_position()?;
        let count = u16::try_from(self.entries.len())
            .ok()
            .filter(|&n| n != 0xFFFF)
            .ok_or_else(|| too_large("entry count"))?;

        let eocd = EndOfCentralDirectory {
            disk_entries: count,
            total_entries: count,
            cd_size: to_u32(cd_end - cd_offset)?,
            cd_offset: to_u32(cd_offset)?,
            comment_len: 0,
        };
        eocd.write_to(&mut self.inner)?;
        self.inner.flush()?;

        Ok(self.inner)
    }
}

fn to_u32(value: u64) -> io::Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|&v| v != u32::MAX)
        .ok_or_else(|| too_large("offset or size"))
}

fn name_len(name: &[u8]) -> io::Result<u16> {
    u16::try_from(name.len()).map_err(|_| too_large("entry name"))
}

fn too_large(what: &str) -> io::Error {
    io::Error::other(format!("{what} needs ZIP64, which is not written"))
}
