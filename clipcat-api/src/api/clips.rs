//! Clip listing endpoints
//!
//! GET /clips[?tag=] returns `{"clips": [...]}`; GET /clips/:reference returns
//! one clip resolved by identifier, then name.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use clipcat_common::Clip;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::AppState;

/// Clip as served over HTTP. `creation_time` is a calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub identifier: String,
    pub name: String,
    pub file_prefix: String,
    pub file: String,
    pub creation_time: String,
    pub tags: Vec<String>,
}

impl From<Clip> for ClipResponse {
    fn from(clip: Clip) -> Self {
        Self {
            id: clip.record_id,
            identifier: clip.identifier,
            name: clip.name,
            file_prefix: clip.file_prefix,
            file: clip.file,
            creation_time: clip.creation_time.format("%Y-%m-%d").to_string(),
            tags: clip.tags.into_iter().collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClipListResponse {
    pub clips: Vec<ClipResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ClipQuery {
    pub tag: Option<String>,
}

/// GET /clips
pub async fn list_clips(
    State(state): State<AppState>,
    Query(query): Query<ClipQuery>,
) -> ApiResult<Json<ClipListResponse>> {
    let tag = query.tag.as_deref().filter(|t| !t.is_empty());
    let clips = state.catalog.get_clips(tag).await?;

    Ok(Json(ClipListResponse {
        clips: clips.into_iter().map(ClipResponse::from).collect(),
    }))
}

/// GET /clips/:reference
pub async fn get_clip(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> ApiResult<Json<ClipResponse>> {
    let clip = state.catalog.find_by_reference(&reference).await?;
    Ok(Json(clip.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeSet;

    #[test]
    fn test_clip_response_shape() {
        let clip = Clip {
            record_id: "4b1d".to_string(),
            identifier: "dh3".to_string(),
            name: "dom_greeting".to_string(),
            file_prefix: "dom_".to_string(),
            file: "dom_greeting.wav".to_string(),
            creation_time: Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 0).unwrap(),
            tags: ["new", "funny"].iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
        };

        let value = serde_json::to_value(ClipResponse::from(clip)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "_id": "4b1d",
                "identifier": "dh3",
                "name": "dom_greeting",
                "file_prefix": "dom_",
                "file": "dom_greeting.wav",
                "creation_time": "2024-02-29",
                "tags": ["funny", "new"],
            })
        );
    }
}
