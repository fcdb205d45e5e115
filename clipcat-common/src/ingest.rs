//! Drop-folder ingestion
//!
//! Scans the staging directory (non-recursive), oldest file first, and for
//! each file moves it into the permanent clip directory and then records it in
//! the catalog. Files recorded less than `new_clip_day_threshold` days ago get
//! the `new` tag.
//!
//! Move-then-insert keeps catalog and filesystem consistent: if the insert
//! fails the file is moved back to staging, and only when that also fails is
//! an `IngestionPartialFailure` reported. The same error is reported when a
//! cross-filesystem copy leaves the file in both directories. Processing stops
//! at the first error; files handled before it stay ingested and are logged.
//!
//! Single writer: concurrent ingestion runs over the same directories are not
//! supported.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::catalog::{ClipCatalog, NewClip, NEW_TAG};
use crate::{Error, Result};

pub const DEFAULT_NEW_CLIP_DAY_THRESHOLD: i64 = 2;

/// A file waiting in the staging directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub modified: DateTime<Utc>,
}

/// List regular files directly under `dir`, ordered by modification time then name
pub fn scan_staging_dir(dir: &Path) -> Result<Vec<StagedFile>> {
    let mut staged = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let file_name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!("Skipping non UTF-8 file name in staging: {:?}", raw);
                continue;
            }
        };

        let modified = DateTime::<Utc>::from(entry.metadata()?.modified()?);
        staged.push(StagedFile {
            path: entry.path(),
            file_name,
            modified,
        });
    }

    staged.sort_by(|a, b| {
        a.modified
            .cmp(&b.modified)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });

    debug!(dir = %dir.display(), files = staged.len(), "Scanned staging directory");
    Ok(staged)
}

/// `{"new"}` when the file is younger than `threshold_days` whole days, else empty
pub fn tags_for_age(modified: DateTime<Utc>, now: DateTime<Utc>, threshold_days: i64) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    if (now - modified).num_days() < threshold_days {
        tags.insert(NEW_TAG.to_string());
    }
    tags
}

/// Staging → permanent directory ingestion
#[derive(Clone)]
pub struct IngestWorkflow {
    catalog: ClipCatalog,
    staging_dir: PathBuf,
    permanent_dir: PathBuf,
    new_clip_day_threshold: i64,
}

impl IngestWorkflow {
    pub fn new(
        catalog: ClipCatalog,
        staging_dir: impl Into<PathBuf>,
        permanent_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            staging_dir: staging_dir.into(),
            permanent_dir: permanent_dir.into(),
            new_clip_day_threshold: DEFAULT_NEW_CLIP_DAY_THRESHOLD,
        }
    }

    pub fn with_new_clip_day_threshold(mut self, days: i64) -> Self {
        self.new_clip_day_threshold = days;
        self
    }

    /// Ingest everything in the staging directory, returning `(identifier, name)`
    /// pairs in processing order
    pub async fn ingest_new_clips(&self) -> Result<Vec<NewClip>> {
        self.ingest_new_clips_at(Utc::now()).await
    }

    /// Same as [`ingest_new_clips`](Self::ingest_new_clips) with an explicit clock
    pub async fn ingest_new_clips_at(&self, now: DateTime<Utc>) -> Result<Vec<NewClip>> {
        fs::create_dir_all(&self.permanent_dir)?;
        let staged = scan_staging_dir(&self.staging_dir)?;

        info!(
            staging = %self.staging_dir.display(),
            files = staged.len(),
            "Starting ingestion"
        );

        let mut added: Vec<NewClip> = Vec::with_capacity(staged.len());
        for file in staged {
            match self.ingest_one(&file, now).await {
                Ok(new_clip) => added.push(new_clip),
                Err(e) => {
                    // Already moved and cataloged; the caller only sees the error
                    for clip in &added {
                        warn!(identifier = %clip.identifier, name = %clip.name, "Ingested before failure");
                    }
                    warn!(
                        file = %file.file_name,
                        ingested = added.len(),
                        "Ingestion stopped: {}", e
                    );
                    return Err(e);
                }
            }
        }

        info!(added = added.len(), "Ingestion complete");
        Ok(added)
    }

    async fn ingest_one(&self, file: &StagedFile, now: DateTime<Utc>) -> Result<NewClip> {
        let destination = self.permanent_dir.join(&file.file_name);
        if destination.exists() {
            return Err(Error::InvalidInput(format!(
                "'{}' already exists in {}",
                file.file_name,
                self.permanent_dir.display()
            )));
        }

        let tags = tags_for_age(file.modified, now, self.new_clip_day_threshold);

        match move_file(&file.path, &destination) {
            Ok(()) => {}
            Err(MoveError::NotMoved(e)) => return Err(Error::Io(e)),
            Err(MoveError::Duplicated { remove_err, cleanup_err }) => {
                return Err(Error::IngestionPartialFailure {
                    file: file.file_name.clone(),
                    reason: format!(
                        "copied to {} but the staged file could not be removed ({}) and the copy could not be cleaned up ({}); nothing was cataloged",
                        destination.display(),
                        remove_err,
                        cleanup_err
                    ),
                })
            }
        }

        match self
            .catalog
            .add_clip(&file.file_name, file.modified, tags)
            .await
        {
            Ok(new_clip) => {
                debug!(file = %file.file_name, identifier = %new_clip.identifier, "Ingested clip");
                Ok(new_clip)
            }
            Err(insert_err) => match move_file(&destination, &file.path) {
                Ok(()) => {
                    warn!(file = %file.file_name, "Catalog insert failed, file returned to staging: {}", insert_err);
                    Err(insert_err)
                }
                Err(restore_err) => Err(Error::IngestionPartialFailure {
                    file: file.file_name.clone(),
                    reason: format!(
                        "catalog insert failed ({}) and the file could not be returned to staging ({}); it remains at {}",
                        insert_err,
                        restore_err,
                        destination.display()
                    ),
                }),
            },
        }
    }
}

/// Why a move did not complete
#[derive(Debug)]
enum MoveError {
    /// The file is still only at its source
    NotMoved(io::Error),
    /// Copied, but the source could not be removed and neither could the copy
    Duplicated {
        remove_err: io::Error,
        cleanup_err: io::Error,
    },
}

impl std::fmt::Display for MoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveError::NotMoved(e) => write!(f, "{}", e),
            MoveError::Duplicated { remove_err, cleanup_err } => write!(
                f,
                "source not removed ({}), copy not cleaned up ({})",
                remove_err, cleanup_err
            ),
        }
    }
}

/// Rename, falling back to copy + remove when the directories are on different filesystems
fn move_file(from: &Path, to: &Path) -> std::result::Result<(), MoveError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(from = %from.display(), "Rename failed ({}), copying instead", rename_err);
            copy_then_remove(from, to, |path| fs::remove_file(path))
        }
    }
}

/// Copy `from` to `to`, then delete `from`. On failure the file is left at
/// exactly one location unless both deletions fail.
fn copy_then_remove<R>(from: &Path, to: &Path, remove: R) -> std::result::Result<(), MoveError>
where
    R: Fn(&Path) -> io::Result<()>,
{
    if let Err(copy_err) = fs::copy(from, to) {
        // Partial copy
        let _ = remove(to);
        return Err(MoveError::NotMoved(copy_err));
    }

    match remove(from) {
        Ok(()) => Ok(()),
        Err(remove_err) => match remove(to) {
            Ok(()) => Err(MoveError::NotMoved(remove_err)),
            Err(cleanup_err) => Err(MoveError::Duplicated {
                remove_err,
                cleanup_err,
            }),
        },
    }
}
