//! kpak CLI - Command-line tool for BAR, QAR and MAR game archives.
//!
//! This is the main entry point for the kpak command-line application.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{warn, Level};

use kpak::prelude::*;

/// kpak - game archive extraction tool
#[derive(Parser)]
#[command(name = "kpak")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract all files from an archive
    Extract {
        /// Path to the archive
        #[arg(env = "KPAK_ARCHIVE")]
        archive: PathBuf,

        /// Output directory
        #[arg(short, long, env = "KPAK_OUTPUT", default_value = "./")]
        output: PathBuf,

        /// Decrypt MAR file payloads
        #[arg(long)]
        decrypt: bool,

        /// Do not log each extracted file (shows a spinner instead)
        #[arg(short, long)]
        quiet: bool,
    },

    /// List contents of an archive
    List {
        /// Path to the archive
        #[arg(env = "KPAK_ARCHIVE")]
        archive: PathBuf,

        /// Decrypt MAR file payloads while reading
        #[arg(long)]
        decrypt: bool,

        /// Show sizes and encryption flags
        #[arg(short, long)]
        detailed: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Extract {
            archive,
            output,
            decrypt,
            quiet,
        } => {
            cmd_extract(&archive, &output, decrypt, quiet)?;
        }
        Commands::List {
            archive,
            decrypt,
            detailed,
        } => {
            cmd_list(&archive, decrypt, detailed)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_archive(path: &Path, decrypt: bool) -> Result<Archive<File>> {
    let archive = Archive::open(path)
        .with_context(|| format!("Failed to determine archive type of {}", path.display()))?
        .with_decryption(decrypt);

    println!("archive type: {}", archive.name());
    if decrypt && archive.format() != ArchiveFormat::Mar {
        warn!("--decrypt only applies to MAR archives");
    }

    Ok(archive)
}

fn cmd_extract(path: &Path, output: &Path, decrypt: bool, quiet: bool) -> Result<()> {
    let archive = open_archive(path, decrypt)?;
    let mut extractor = Extractor::new(output).silent(quiet);

    // Per-file log lines already show progress; the spinner is for quiet runs.
    let pb = if quiet {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} entries {wide_msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let mut bytes = 0u64;

    archive.for_each(|entry: &mut ArchiveEntry<'_>| -> Result<()> {
        let name = entry.filename().into_owned();
        extractor
            .extract(entry)
            .with_context(|| format!("Failed to extract {}", name))?;

        bytes += entry.size();
        pb.set_message(name);
        pb.inc(1);
        Ok(())
    })?;

    pb.finish_and_clear();
    println!(
        "Extracted {} entries ({} bytes) in {:?}",
        pb.position(),
        bytes,
        start.elapsed()
    );

    Ok(())
}

fn cmd_list(path: &Path, decrypt: bool, detailed: bool) -> Result<()> {
    let archive = open_archive(path, decrypt)?;

    let start = Instant::now();
    let mut count = 0;

    archive.for_each(|entry: &mut ArchiveEntry<'_>| -> Result<()> {
        if detailed {
            println!(
                "{:>12} {} {}",
                entry.size(),
                if entry.is_encrypted() { "E" } else { " " },
                entry.filename()
            );
        } else {
            println!("{}", entry.filename());
        }

        entry.skip()?;
        count += 1;
        Ok(())
    })?;

    println!("\nTotal: {} entries in {:?}", count, start.elapsed());

    Ok(())
}
