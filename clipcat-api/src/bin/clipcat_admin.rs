//! clipcat-admin - operator tool for the clip catalog
//!
//! Installs the prefix table, runs drop-folder ingestion, edits tags and the
//! playback volume, and resets test deployments.

use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use clipcat_api::cli::{bootstrap, ConfigArgs};
use clipcat_common::catalog::{is_audio_file, reset_all, VALID_AUDIO_FORMATS};
use clipcat_common::config::Settings;
use clipcat_common::db::{DocumentStore, SqliteDocumentStore};
use clipcat_common::{ClipCatalog, IngestWorkflow, PlaybackVolume};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "clipcat-admin")]
#[command(about = "Administer the clip catalog")]
#[command(version)]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install or update the prefix mapping table and the playback volume record
    Setup,
    /// Move every staged file into the clip directory and catalog it
    Ingest,
    /// Catalog a file that is already in the clip directory
    Add {
        file: String,
        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    /// List clips, optionally only those with a tag
    List {
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Print every clip name
    Names,
    /// Add a tag to clips (identifiers or names)
    Tag {
        tag: String,
        #[arg(required = true)]
        references: Vec<String>,
    },
    /// Remove a tag from clips (identifiers or names)
    Untag {
        tag: String,
        #[arg(required = true)]
        references: Vec<String>,
    },
    /// Show the playback volume, or set it
    Volume { value: Option<f64> },
    /// Delete every clip and reset all counters
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = bootstrap(&args.config, args.config.overrides())?;

    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteDocumentStore::connect(&settings.database_path)
            .await
            .with_context(|| {
                format!("Failed to open database {}", settings.database_path.display())
            })?,
    );

    let result = run(args.command, &settings, Arc::clone(&store)).await;
    store.close().await;
    result
}

async fn run(command: Command, settings: &Settings, store: Arc<dyn DocumentStore>) -> Result<()> {
    let catalog = ClipCatalog::new(Arc::clone(&store));

    match command {
        Command::Setup => {
            catalog.registry().initialize(&settings.prefix_mappings).await?;
            let volume = PlaybackVolume::new(store).ensure().await?;
            for mapping in catalog.registry().mappings().await? {
                println!(
                    "{:<12} -> {:<4} next {}",
                    mapping.file_prefix,
                    format!("'{}'", mapping.identifier_prefix),
                    mapping.next_id
                );
            }
            println!("playback volume {}", volume);
        }

        Command::Ingest => {
            let workflow =
                IngestWorkflow::new(catalog, &settings.staging_dir, &settings.clips_dir)
                    .with_new_clip_day_threshold(settings.new_clip_day_threshold);
            let added = workflow.ingest_new_clips().await?;
            for clip in &added {
                println!("{}\t{}", clip.identifier, clip.name);
            }
            info!(count = added.len(), "Ingestion finished");
        }

        Command::Add { file, tags } => {
            let file_name = Path::new(&file)
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("'{}' has no file name", file))?;
            if !is_audio_file(file_name) {
                bail!(
                    "'{}' is not an audio file (expected one of: {})",
                    file_name,
                    VALID_AUDIO_FORMATS.join(", ")
                );
            }
            let tags: BTreeSet<String> = tags.into_iter().collect();
            let added = catalog.add_clip(file_name, Utc::now(), tags).await?;
            println!("{}\t{}", added.identifier, added.name);
        }

        Command::List { tag } => {
            for clip in catalog.get_clips(tag.as_deref()).await? {
                let tags: Vec<&str> = clip.tags.iter().map(String::as_str).collect();
                println!(
                    "{}\t{}\t{}\t{}\t[{}]",
                    clip.identifier,
                    clip.name,
                    clip.file,
                    clip.creation_time.format("%Y-%m-%d"),
                    tags.join(", ")
                );
            }
        }

        Command::Names => {
            for name in catalog.get_all_names().await? {
                println!("{}", name);
            }
        }

        Command::Tag { tag, references } => {
            for clip in catalog.tag(&references, &tag).await? {
                println!("{}\t{}", clip.identifier, clip.name);
            }
        }

        Command::Untag { tag, references } => {
            for clip in catalog.untag(&references, &tag).await? {
                println!("{}\t{}", clip.identifier, clip.name);
            }
        }

        Command::Volume { value } => {
            let volume = PlaybackVolume::new(store);
            if let Some(value) = value {
                volume.set_volume(value).await?;
            }
            println!("{}", volume.get_volume().await?);
        }

        Command::Reset { yes } => {
            if !yes && !confirm("Delete every clip and reset all identifier counters?")? {
                println!("Aborted");
                return Ok(());
            }
            let summary = reset_all(store).await?;
            println!(
                "Deleted {} clips, reset {} counters",
                summary.clips_deleted, summary.mappings_reset
            );
        }
    }

    Ok(())
}

/// `(y/N)` prompt on stdin
fn confirm(question: &str) -> Result<bool> {
    print!("{} (y/N) ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
