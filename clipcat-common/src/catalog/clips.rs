//! Clip catalog
//!
//! Stores clip metadata and resolves references. A reference is either a
//! clip identifier (`dh3`) or a clip name (`dom_greeting`); identifiers are
//! tried first.
//!
//! Batch tag/untag is validate-then-apply: every reference is resolved (and,
//! for untag, checked for the tag) before any clip is written. A single bad
//! reference aborts the whole batch with nothing modified.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use super::models::{clip_name, Clip, NewClip, IDENTIFIER, NAME, TAGS};
use super::registry::PrefixRegistry;
use crate::db::{from_document, to_document, Collection, DocumentStore, Filter, Update, ID_FIELD};
use crate::{Error, Result};

/// Clip metadata operations over the `clips` collection
#[derive(Clone)]
pub struct ClipCatalog {
    store: Arc<dyn DocumentStore>,
    registry: PrefixRegistry,
}

impl ClipCatalog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let registry = PrefixRegistry::new(Arc::clone(&store));
        Self { store, registry }
    }

    pub fn registry(&self) -> &PrefixRegistry {
        &self.registry
    }

    /// Add a clip for `file`, allocating its identifier.
    ///
    /// Increments exactly one prefix counter. Returns `(identifier, name)`.
    pub async fn add_clip(
        &self,
        file: &str,
        upload_time: DateTime<Utc>,
        tags: BTreeSet<String>,
    ) -> Result<NewClip> {
        let name = clip_name(file);
        if name.is_empty() {
            return Err(Error::InvalidInput(format!("cannot derive a name from '{}'", file)));
        }

        let allocation = self.registry.allocate(&name).await?;

        let clip = Clip {
            record_id: String::new(),
            identifier: allocation.identifier.clone(),
            name: name.clone(),
            file_prefix: allocation.matched_prefix,
            file: file.to_string(),
            creation_time: upload_time,
            tags,
        };
        self.store
            .insert_one(Collection::Clips, to_document(&clip)?)
            .await?;

        info!(identifier = %clip.identifier, name = %name, file = %file, "Added clip");
        Ok(NewClip::new(allocation.identifier, name))
    }

    /// All clips, or only those carrying `tag`, in store order
    pub async fn get_clips(&self, tag: Option<&str>) -> Result<Vec<Clip>> {
        let filter = match tag {
            Some(tag) => Filter::eq(TAGS, tag),
            None => Filter::all(),
        };
        self.store
            .find(Collection::Clips, &filter)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Names of every clip in store order
    pub async fn get_all_names(&self) -> Result<Vec<String>> {
        Ok(self
            .get_clips(None)
            .await?
            .into_iter()
            .map(|clip| clip.name)
            .collect())
    }

    /// Resolve a reference by identifier, then by name
    pub async fn find_by_reference(&self, reference: &str) -> Result<Clip> {
        for key in [IDENTIFIER, NAME] {
            if let Some(document) = self
                .store
                .find_one(Collection::Clips, &Filter::eq(key, reference))
                .await?
            {
                return from_document(document);
            }
        }
        Err(Error::ClipNotFound(reference.to_string()))
    }

    /// File of the clip a reference resolves to
    pub async fn get_file_by_reference(&self, reference: &str) -> Result<String> {
        Ok(self.find_by_reference(reference).await?.file)
    }

    /// Add `tag` to every referenced clip. Tagging twice is a no-op.
    pub async fn tag(&self, references: &[String], tag: &str) -> Result<Vec<Clip>> {
        validate_tag(tag)?;
        let mut clips = distinct(self.resolve_all(references).await?);

        for clip in clips.iter_mut() {
            clip.tags.insert(tag.to_string());
            self.write_tags(clip).await?;
        }

        info!(tag = %tag, clips = clips.len(), "Tagged clips");
        Ok(clips)
    }

    /// Remove `tag` from every referenced clip.
    ///
    /// Fails with `TagNotPresent` if any clip lacks the tag.
    pub async fn untag(&self, references: &[String], tag: &str) -> Result<Vec<Clip>> {
        let resolved = self.resolve_all(references).await?;

        if let Some((reference, _)) = resolved.iter().find(|(_, clip)| !clip.has_tag(tag)) {
            return Err(Error::TagNotPresent {
                reference: reference.clone(),
                tag: tag.to_string(),
            });
        }

        let mut clips = distinct(resolved);
        for clip in clips.iter_mut() {
            clip.tags.remove(tag);
            self.write_tags(clip).await?;
        }

        info!(tag = %tag, clips = clips.len(), "Untagged clips");
        Ok(clips)
    }

    /// Resolve every reference, failing on the first unknown one
    async fn resolve_all(&self, references: &[String]) -> Result<Vec<(String, Clip)>> {
        let mut resolved = Vec::with_capacity(references.len());
        for reference in references {
            let clip = self.find_by_reference(reference).await?;
            resolved.push((reference.clone(), clip));
        }
        Ok(resolved)
    }

    async fn write_tags(&self, clip: &Clip) -> Result<()> {
        let tags = Value::from(clip.tags.iter().cloned().collect::<Vec<_>>());
        self.store
            .update_one(
                Collection::Clips,
                &Filter::eq(ID_FIELD, clip.record_id.as_str()),
                &Update::set(TAGS, tags),
            )
            .await?;
        debug!(identifier = %clip.identifier, tags = ?clip.tags, "Stored tags");
        Ok(())
    }
}

/// One entry per clip, in first-seen order. Two references may name the same clip.
fn distinct(resolved: Vec<(String, Clip)>) -> Vec<Clip> {
    let mut clips: Vec<Clip> = Vec::with_capacity(resolved.len());
    for (_, clip) in resolved {
        if !clips.iter().any(|c| c.record_id == clip.record_id) {
            clips.push(clip);
        }
    }
    clips
}

fn validate_tag(tag: &str) -> Result<()> {
    if tag.trim().is_empty() {
        return Err(Error::InvalidInput("tag must not be empty".to_string()));
    }
    Ok(())
}
