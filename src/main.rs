//! Main entry point for the zipfs CLI application.
//!
//! A thin inspection tool over the library: list archive entries with
//! their recovered names, walk trees containing archives, and resolve
//! virtual paths.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use zipfs::cli::Command;
use zipfs::zip::names;
use zipfs::{Cli, LocalFileReader, OpenMode, ZipExtractor, ZipFs};

fn main() -> Result<()> {
    // Respects RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    match cli.command {
        Command::List { file, verbose } => list_files(&file, verbose),
        Command::Walk {
            top,
            load,
            bottom_up,
            follow_links,
        } => {
            let mut fs = ZipFs::with_config(config);
            load_all(&mut fs, &load)?;

            let walk = fs
                .walk(&top)
                .topdown(!bottom_up)
                .follow_symlinks(follow_links)
                .on_error(|err| eprintln!("zipfs: {err}"));
            for entry in walk {
                println!("{}/", entry.dir);
                for dir in &entry.dirs {
                    println!("  {dir}/");
                }
                for file in &entry.files {
                    println!("  {file}");
                }
            }

            fs.close_all(false)?;
            Ok(())
        }
        Command::Resolve { path, load } => {
            let mut fs = ZipFs::with_config(config);
            load_all(&mut fs, &load)?;

            // The working directory is gone once the archive is closed,
            // so the path is printed for inspection only
            let real = fs.resolve(&path)?;
            println!("{}", real.display());

            fs.close_all(false)?;
            Ok(())
        }
    }
}

fn load_all(fs: &mut ZipFs, archives: &[PathBuf]) -> Result<()> {
    for archive in archives {
        fs.open(archive, false, OpenMode::Read)
            .with_context(|| format!("loading {}", archive.display()))?;
    }
    Ok(())
}

/// List entries in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format: Just entry names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio and timestamps
///
/// Names are shown after legacy code page correction.
fn list_files(path: &Path, verbose: bool) -> Result<()> {
    let reader = LocalFileReader::new(path)?;
    let extractor = ZipExtractor::new(reader);
    let entries = extractor
        .list_files()
        .with_context(|| format!("reading {}", path.display()))?;

    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        let name = names::entry_name(entry);

        if !verbose {
            println!("{name}");
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed,
            total_compressed,
            ratio(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }

    Ok(())
}

/// Space saved by compression, as a right-aligned percentage
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}
