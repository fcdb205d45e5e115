//! Stored document shapes and field names

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::db::DocumentId;

pub const FILE_PREFIX: &str = "file_prefix";
pub const IDENTIFIER_PREFIX: &str = "identifier_prefix";
pub const NEXT_ID: &str = "next_id";
pub const IDENTIFIER: &str = "identifier";
pub const NAME: &str = "name";
pub const FILE: &str = "file";
pub const CREATION_TIME: &str = "creation_time";
pub const TAGS: &str = "tags";
pub const PLAYBACK_VOLUME: &str = "playback_volume";

/// File prefix of the catch-all mapping
pub const GENERIC_PREFIX: &str = "generic";

/// Tag applied by ingestion to recently recorded clips
pub const NEW_TAG: &str = "new";

/// Audio formats accepted into the catalog
pub const VALID_AUDIO_FORMATS: &[&str] = &["wav", "mp3"];

/// Mappings installed by `clipcat-admin setup` when the config names none
pub const DEFAULT_PREFIX_MAPPINGS: &[(&str, &str)] = &[
    ("daryl_", "dm"),
    ("david_", "dg"),
    ("dom_", "dh"),
    ("jake_", "ja"),
    ("ollie_", "oy"),
    ("will_", "wt"),
    (GENERIC_PREFIX, ""),
];

/// Identifier allocation state for one file prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixMapping {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub record_id: DocumentId,
    pub file_prefix: String,
    pub identifier_prefix: String,
    pub next_id: u64,
}

impl PrefixMapping {
    pub fn new(file_prefix: impl Into<String>, identifier_prefix: impl Into<String>) -> Self {
        Self {
            record_id: DocumentId::new(),
            file_prefix: file_prefix.into(),
            identifier_prefix: identifier_prefix.into(),
            next_id: 0,
        }
    }

    /// Identifier for a given counter value, e.g. `dh` + 3 = `dh3`
    pub fn identifier_for(&self, counter: u64) -> String {
        format!("{}{}", self.identifier_prefix, counter)
    }
}

/// Catalog entry for one audio clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub record_id: DocumentId,
    pub identifier: String,
    pub name: String,
    /// File prefix matched when the identifier was allocated
    #[serde(default)]
    pub file_prefix: String,
    pub file: String,
    pub creation_time: DateTime<Utc>,
    /// Sorted and duplicate-free by construction
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl Clip {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Result of adding a clip: `(identifier, name)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClip {
    pub identifier: String,
    pub name: String,
}

impl NewClip {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
        }
    }
}

/// Outcome of a registry allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub identifier: String,
    pub matched_prefix: String,
}

/// Display name for a file: its stem, e.g. `dom_greeting.wav` → `dom_greeting`
pub fn clip_name(file: &str) -> String {
    std::path::Path::new(file)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.to_string())
}

/// Whether the file extension is one of [`VALID_AUDIO_FORMATS`] (case-insensitive)
pub fn is_audio_file(file: &str) -> bool {
    std::path::Path::new(file)
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            VALID_AUDIO_FORMATS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
