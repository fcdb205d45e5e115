//! Document store contract
//!
//! Mirrors the small subset of document-database operations the catalog
//! needs: find, find-one, insert, update-by-filter, delete-many and an atomic
//! find-and-update used for counter allocation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Field holding the store-assigned document id
pub const ID_FIELD: &str = "_id";

/// Opaque store-assigned document id
pub type DocumentId = String;

/// A stored document. Documents read back from the store always carry `_id`.
pub type Document = Map<String, Value>;

/// Named document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Prefix mappings used for identifier allocation
    Identifiers,
    /// Clip metadata
    Clips,
    /// Singleton playback volume record
    PlaybackVolume,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Identifiers => "identifiers",
            Collection::Clips => "clips",
            Collection::PlaybackVolume => "playback_volume",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conjunction of field conditions.
///
/// A condition on `_id` matches the document id. Any other condition matches
/// when the field equals the value or, for array fields, contains it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every document in the collection
    pub fn all() -> Self {
        Self::default()
    }

    /// Single field condition
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }

    /// Match by store-assigned id
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::eq(ID_FIELD, Value::String(id.into()))
    }

    /// Add another condition
    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Modification applied by `update_one` / `find_one_and_update`
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Overwrite (or add) the listed fields
    Set(Vec<(String, Value)>),
    /// Add `delta` to a numeric field, treating a missing field as 0
    Increment(String, i64),
}

impl Update {
    pub fn set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Update::Set(vec![(field.into(), value.into())])
    }

    pub fn increment(field: impl Into<String>, delta: i64) -> Self {
        Update::Increment(field.into(), delta)
    }
}

/// Persistence collaborator used by the registry, catalog and settings.
///
/// Every read goes to the backing store; implementations must not cache.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All matching documents in store-native (insertion) order
    async fn find(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>>;

    /// First matching document in store-native order
    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>>;

    /// Insert a document and return its generated id. An `_id` in the input is ignored.
    async fn insert_one(&self, collection: Collection, document: Document) -> Result<DocumentId>;

    /// Apply `update` to the first matching document. Returns the number of
    /// documents modified (0 or 1).
    async fn update_one(&self, collection: Collection, filter: &Filter, update: &Update)
        -> Result<u64>;

    /// Atomically apply `update` to the first matching document and return the
    /// document as it is after the update.
    async fn find_one_and_update(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> Result<Option<Document>>;

    /// Delete every matching document, returning how many were removed
    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64>;

    /// Release the underlying connections
    async fn close(&self);
}

/// Serialize a domain value into a document body
pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidInput(format!(
            "expected an object document, got {}",
            other
        ))),
    }
}

/// Deserialize a stored document into a domain value
pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_builders() {
        let filter = Filter::eq("name", "dom_greeting").and("tags", "new");
        assert_eq!(filter.conditions().len(), 2);
        assert_eq!(filter.conditions()[1], ("tags".to_string(), json!("new")));

        assert!(Filter::all().is_empty());
        assert_eq!(Filter::by_id("abc").conditions()[0].0, ID_FIELD);
    }

    #[test]
    fn test_to_document_rejects_non_objects() {
        assert!(to_document(&json!({"a": 1})).is_ok());
        assert!(matches!(to_document(&5), Err(Error::InvalidInput(_))));
    }
}
