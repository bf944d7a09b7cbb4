use clap::{Parser, Subcommand};
use hoard::packfile::MAX_BLOCK_LEN;
use hoard::{Digest, Hoard, HoardError, Repo, RepoOptions, Result};
use std::io::Write as _;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hoard", version = "1.0.0", about = "Content-addressed block store CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a single bounded block (<= 65535 bytes) read from a file
    Write { repo: PathBuf, file: PathBuf },
    /// Write an arbitrarily large byte stream, chunked through the superblock codec
    Writelong { repo: PathBuf, file: PathBuf },
    /// Read a single block by its hex digest, writing its bytes to stdout
    Read { repo: PathBuf, digest: String },
    /// Read a superblock stream by its root hex digest, writing its bytes to stdout
    Readlong { repo: PathBuf, digest: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    std::process::exit(run());
}

fn run() -> i32 {
    match dispatch(Cli::parse().command) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("error: {e}");
            255
        }
    }
}

/// Returns `Ok(true)` on success, `Ok(false)` for a `read`/`readlong` whose
/// digest isn't present, and `Err` for everything else — the three outcomes
/// that map onto exit codes 0/1/255.
fn dispatch(command: Commands) -> Result<bool> {
    match command {
        Commands::Write { repo, file } => {
            let bytes = std::fs::read(&file)?;
            if bytes.len() > MAX_BLOCK_LEN {
                return Err(HoardError::BackendLimit(format!(
                    "{} is {} bytes, over the {MAX_BLOCK_LEN}-byte limit for write (use writelong)",
                    file.display(),
                    bytes.len()
                )));
            }

            let repository = Repo::open(&repo, RepoOptions::default())?;
            let digest = repository.write(&bytes)?;
            repository.sync()?;
            println!("{}", digest.to_hex());
            Ok(true)
        }

        Commands::Writelong { repo, file } => {
            let bytes = std::fs::read(&file)?;
            let hoard = Hoard::open(&repo, RepoOptions::default())?;
            let root = hoard.write_stream(&bytes)?;
            hoard.sync()?;
            println!("{}", root.to_hex());
            Ok(true)
        }

        Commands::Read { repo, digest } => {
            let digest = Digest::from_hex(&digest)?;
            let repository = Repo::open(&repo, read_only())?;
            match repository.read(&digest)? {
                Some(bytes) => {
                    std::io::stdout().write_all(&bytes)?;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        Commands::Readlong { repo, digest } => {
            let digest = Digest::from_hex(&digest)?;
            let hoard = Hoard::open(&repo, read_only())?;
            if !hoard.contains_block(&digest) {
                return Ok(false);
            }
            let bytes = hoard.read_stream(&digest)?;
            std::io::stdout().write_all(&bytes)?;
            Ok(true)
        }
    }
}

fn read_only() -> RepoOptions {
    RepoOptions {
        writable: false,
        ..RepoOptions::default()
    }
}
