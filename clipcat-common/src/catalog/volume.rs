//! Playback volume setting
//!
//! A single document in the `playback_volume` collection holding one number.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use super::models::PLAYBACK_VOLUME;
use crate::db::{Collection, DocumentStore, Filter, Update};
use crate::{Error, Result};

/// Volume written when the record does not exist yet
pub const DEFAULT_PLAYBACK_VOLUME: f64 = 0.5;

#[derive(Clone)]
pub struct PlaybackVolume {
    store: Arc<dyn DocumentStore>,
}

impl PlaybackVolume {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create the record with the default volume if it is missing
    pub async fn ensure(&self) -> Result<f64> {
        match self.read().await? {
            Some(volume) => Ok(volume),
            None => {
                self.insert(DEFAULT_PLAYBACK_VOLUME).await?;
                info!(volume = DEFAULT_PLAYBACK_VOLUME, "Created playback volume record");
                Ok(DEFAULT_PLAYBACK_VOLUME)
            }
        }
    }

    /// Current volume. Fails with `Config` if the record was never created.
    pub async fn get_volume(&self) -> Result<f64> {
        self.read()
            .await?
            .ok_or_else(|| Error::Config("playback volume has not been initialized".to_string()))
    }

    /// Persist `volume`, creating the record if absent
    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        if !volume.is_finite() || volume < 0.0 {
            return Err(Error::InvalidInput(format!(
                "volume must be a finite, non-negative number, got {}",
                volume
            )));
        }

        let modified = self
            .store
            .update_one(
                Collection::PlaybackVolume,
                &Filter::all(),
                &Update::set(PLAYBACK_VOLUME, volume),
            )
            .await?;
        if modified == 0 {
            self.insert(volume).await?;
        }

        info!(volume, "Playback volume set");
        Ok(())
    }

    async fn read(&self) -> Result<Option<f64>> {
        let record = self
            .store
            .find_one(Collection::PlaybackVolume, &Filter::all())
            .await?;

        match record {
            None => Ok(None),
            Some(document) => document
                .get(PLAYBACK_VOLUME)
                .and_then(Value::as_f64)
                .map(Some)
                .ok_or_else(|| {
                    Error::InvalidInput(format!("playback volume record has no numeric '{}'", PLAYBACK_VOLUME))
                }),
        }
    }

    async fn insert(&self, volume: f64) -> Result<()> {
        let mut document = Map::new();
        document.insert(PLAYBACK_VOLUME.to_string(), Value::from(volume));
        self.store
            .insert_one(Collection::PlaybackVolume, document)
            .await?;
        Ok(())
    }
}
