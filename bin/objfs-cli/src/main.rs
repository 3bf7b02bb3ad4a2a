//! objfs CLI - inspect and edit object-backed file metadata
//!
//! Operates directly on `<file>.meta` sidecars. Only one writer per logical
//! file may run at a time.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use objfs_common::{FileConfig, ObjectStorageConfig};
use objfs_meta::{MetadataFile, ObjectDescriptor};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "objfs-cli")]
#[command(about = "objfs metadata CLI")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML, `[objectstorage] object_size = ...`)
    #[arg(short, long, env = "OBJFS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Print descriptors as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print version, revision and all objects of a logical file
    Show {
        /// Logical file path (the sidecar is `<file>.meta`)
        file: PathBuf,
    },
    /// Append a new object after the last one
    Append {
        file: PathBuf,
        /// Source name recorded in the object key
        source: String,
        length: u64,
    },
    /// List objects that may hold bytes of a range
    Query {
        file: PathBuf,
        offset: u64,
        length: u64,
    },
    /// Change the length of the object starting at `offset`
    SetLength {
        file: PathBuf,
        offset: u64,
        length: u64,
    },
    /// Give the object at `offset` a fresh key and a new length
    Rekey {
        file: PathBuf,
        offset: u64,
        length: u64,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let provider = FileConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    let config = ObjectStorageConfig::from_provider(&provider)?;
    info!("Object capacity: {} bytes", config.object_size);

    match args.command {
        Commands::Show { file } => {
            let meta = open_existing(&file, config)?;
            if args.json {
                print_descriptors(&meta.read().descriptors(), true)?;
            } else {
                print!("{}", meta.read());
            }
        }
        Commands::Append {
            file,
            source,
            length,
        } => {
            let meta = open(&file, config)?;
            let added = meta.append(&source, length)?;
            let revision = meta.commit()?;
            info!("Committed revision {}", revision);
            print_descriptors(&[added], args.json)?;
        }
        Commands::Query {
            file,
            offset,
            length,
        } => {
            let meta = open_existing(&file, config)?;
            let objects = meta.range_query(offset, length);
            if objects.is_empty() && !args.json {
                println!("(beyond end of file)");
            } else {
                print_descriptors(&objects, args.json)?;
            }
        }
        Commands::SetLength {
            file,
            offset,
            length,
        } => {
            let meta = open(&file, config)?;
            meta.update_entry_length(offset, length)?;
            meta.commit()?;
        }
        Commands::Rekey {
            file,
            offset,
            length,
        } => {
            let meta = open(&file, config)?;
            let current = meta
                .read()
                .get(offset)
                .cloned()
                .ok_or(objfs_common::Error::NotFound { offset })?;
            let key = current.key.regenerate(length)?;
            meta.update_entry(offset, key.clone(), length)?;
            meta.commit()?;
            println!("{key}");
        }
    }

    Ok(())
}

fn open(file: &Path, config: ObjectStorageConfig) -> Result<MetadataFile> {
    MetadataFile::open(file, config)
        .with_context(|| format!("failed to open metadata for {}", file.display()))
}

fn open_existing(file: &Path, config: ObjectStorageConfig) -> Result<MetadataFile> {
    let meta = MetadataFile::open_existing(file, config)
        .with_context(|| format!("failed to read metadata for {}", file.display()))?;
    match meta {
        Some(meta) => Ok(meta),
        None => bail!("no sidecar for {}", file.display()),
    }
}

fn print_descriptors(objects: &[ObjectDescriptor], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(objects)?);
        return Ok(());
    }
    for object in objects {
        println!(
            "Name: {} Length: {} Offset: {}",
            object.key, object.length, object.offset
        );
    }
    Ok(())
}
