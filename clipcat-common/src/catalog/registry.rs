//! Prefix registry
//!
//! Maps a clip's file-name prefix (`dom_`) to a short identifier prefix (`dh`)
//! and a per-mapping counter. Allocation and increment happen in a single
//! atomic store update, so concurrent allocations never share an identifier.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use super::models::{
    Allocation, PrefixMapping, DEFAULT_PREFIX_MAPPINGS, FILE_PREFIX, GENERIC_PREFIX,
    IDENTIFIER_PREFIX, NEXT_ID,
};
use crate::db::{from_document, to_document, Collection, DocumentStore, Filter, Update, ID_FIELD};
use crate::{Error, Result};

/// Built-in mapping table as owned pairs
pub fn default_mappings() -> Vec<(String, String)> {
    DEFAULT_PREFIX_MAPPINGS
        .iter()
        .map(|(file, id)| (file.to_string(), id.to_string()))
        .collect()
}

/// Pick the mapping for a file name.
///
/// Longest prefix wins so `dom_extra_` is never masked by `dom_`; equal lengths
/// are ordered by text. The generic mapping is never matched by substring,
/// only used as the fallback.
pub fn select_prefix<'a, I>(prefixes: I, file_base_name: &str) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidates: Vec<&str> = prefixes
        .into_iter()
        .filter(|p| !p.is_empty() && *p != GENERIC_PREFIX)
        .collect();
    candidates.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    candidates
        .into_iter()
        .find(|prefix| file_base_name.contains(prefix))
}

/// Identifier allocation over the `identifiers` collection
#[derive(Clone)]
pub struct PrefixRegistry {
    store: Arc<dyn DocumentStore>,
}

impl PrefixRegistry {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// All mappings in registration order
    pub async fn mappings(&self) -> Result<Vec<PrefixMapping>> {
        self.store
            .find(Collection::Identifiers, &Filter::all())
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Install the mapping table.
    ///
    /// Upserts by file prefix: existing mappings keep their counter and take the
    /// new identifier prefix, new ones start at 0. The table must contain a
    /// `generic` entry with an empty identifier prefix and no duplicate file
    /// prefixes. Every other identifier prefix must be non-empty, must not end
    /// in a digit, and must be unique across the stored and incoming mappings,
    /// so that no two mappings can ever produce the same identifier.
    pub async fn initialize(&self, mappings: &[(String, String)]) -> Result<()> {
        validate_mappings(mappings)?;

        let stored = self.mappings().await?;
        let mut effective: BTreeMap<&str, &str> = stored
            .iter()
            .map(|m| (m.file_prefix.as_str(), m.identifier_prefix.as_str()))
            .collect();
        for (file_prefix, identifier_prefix) in mappings {
            effective.insert(file_prefix.as_str(), identifier_prefix.as_str());
        }
        validate_identifier_prefixes(&effective)?;

        for (file_prefix, identifier_prefix) in mappings {
            let filter = Filter::eq(FILE_PREFIX, file_prefix.as_str());
            let existing = self.store.find_one(Collection::Identifiers, &filter).await?;

            match existing {
                Some(_) => {
                    self.store
                        .update_one(
                            Collection::Identifiers,
                            &filter,
                            &Update::set(IDENTIFIER_PREFIX, identifier_prefix.as_str()),
                        )
                        .await?;
                    debug!(file_prefix = %file_prefix, identifier_prefix = %identifier_prefix, "Updated prefix mapping");
                }
                None => {
                    let mapping = PrefixMapping::new(file_prefix.as_str(), identifier_prefix.as_str());
                    self.store
                        .insert_one(Collection::Identifiers, to_document(&mapping)?)
                        .await?;
                    info!(file_prefix = %file_prefix, identifier_prefix = %identifier_prefix, "Registered prefix mapping");
                }
            }
        }

        Ok(())
    }

    /// Allocate the next identifier for a file base name
    pub async fn allocate(&self, file_base_name: &str) -> Result<Allocation> {
        let mappings = self.mappings().await?;
        let target = select_prefix(
            mappings.iter().map(|m| m.file_prefix.as_str()),
            file_base_name,
        )
        .unwrap_or(GENERIC_PREFIX)
        .to_string();

        let updated = self
            .store
            .find_one_and_update(
                Collection::Identifiers,
                &Filter::eq(FILE_PREFIX, target.as_str()),
                &Update::increment(NEXT_ID, 1),
            )
            .await?
            .ok_or_else(|| Error::RegistryNotFound(target.clone()))?;

        let mapping: PrefixMapping = from_document(updated)?;
        // The returned document already carries the incremented counter
        let counter = mapping.next_id.checked_sub(1).ok_or_else(|| {
            Error::InvalidInput(format!("counter for '{}' did not advance", target))
        })?;
        let identifier = mapping.identifier_for(counter);

        debug!(file = %file_base_name, prefix = %target, identifier = %identifier, "Allocated identifier");

        Ok(Allocation {
            identifier,
            matched_prefix: target,
        })
    }

    /// Set every mapping's counter back to 0. Returns the number of mappings reset.
    pub async fn reset_counters(&self) -> Result<u64> {
        let mut reset = 0;
        for mapping in self.mappings().await? {
            reset += self
                .store
                .update_one(
                    Collection::Identifiers,
                    &Filter::eq(ID_FIELD, mapping.record_id.as_str()),
                    &Update::set(NEXT_ID, 0),
                )
                .await?;
        }
        info!(mappings = reset, "Reset prefix counters");
        Ok(reset)
    }
}

fn validate_mappings(mappings: &[(String, String)]) -> Result<()> {
    let mut seen = HashSet::new();
    for (file_prefix, identifier_prefix) in mappings {
        if file_prefix.is_empty() {
            return Err(Error::InvalidInput("file prefix must not be empty".to_string()));
        }
        if !seen.insert(file_prefix.as_str()) {
            return Err(Error::InvalidInput(format!(
                "duplicate file prefix '{}'",
                file_prefix
            )));
        }
        if file_prefix != GENERIC_PREFIX && identifier_prefix.is_empty() {
            return Err(Error::InvalidInput(format!(
                "'{}' needs a non-empty identifier prefix; only '{}' may use bare numbers",
                file_prefix, GENERIC_PREFIX
            )));
        }
        if identifier_prefix.ends_with(|c: char| c.is_ascii_digit()) {
            return Err(Error::InvalidInput(format!(
                "identifier prefix '{}' for '{}' must not end in a digit",
                identifier_prefix, file_prefix
            )));
        }
    }

    match mappings.iter().find(|(file_prefix, _)| file_prefix == GENERIC_PREFIX) {
        Some((_, identifier_prefix)) if identifier_prefix.is_empty() => Ok(()),
        Some((_, identifier_prefix)) => Err(Error::InvalidInput(format!(
            "'{}' mapping must have an empty identifier prefix, got '{}'",
            GENERIC_PREFIX, identifier_prefix
        ))),
        None => Err(Error::InvalidInput(format!(
            "mapping table must include a '{}' entry",
            GENERIC_PREFIX
        ))),
    }
}

/// Identifier prefixes of the table as it will be after the upsert must be unique
fn validate_identifier_prefixes(effective: &BTreeMap<&str, &str>) -> Result<()> {
    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
    for (&file_prefix, &identifier_prefix) in effective {
        if let Some(other) = owners.insert(identifier_prefix, file_prefix) {
            return Err(Error::InvalidInput(format!(
                "identifier prefix '{}' is used by both '{}' and '{}'",
                identifier_prefix, other, file_prefix
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteDocumentStore;

    async fn setup_registry() -> PrefixRegistry {
        let store = SqliteDocumentStore::in_memory().await.unwrap();
        let registry = PrefixRegistry::new(Arc::new(store));
        registry.initialize(&default_mappings()).await.unwrap();
        registry
    }

    #[test]
    fn test_select_prefix_prefers_longest() {
        let prefixes = ["dom_", "dom_extra_", "generic"];
        assert_eq!(
            select_prefix(prefixes.iter().copied(), "dom_extra_hello"),
            Some("dom_extra_")
        );
        assert_eq!(select_prefix(prefixes.iter().copied(), "dom_hello"), Some("dom_"));
        assert_eq!(select_prefix(prefixes.iter().copied(), "generic_old"), None);
    }

    #[test]
    fn test_select_prefix_matches_anywhere() {
        let prefixes = ["jake_"];
        assert_eq!(
            select_prefix(prefixes.iter().copied(), "bot_hello_jake_1"),
            Some("jake_")
        );
    }

    #[tokio::test]
    async fn test_allocate_increments_per_mapping() {
        let registry = setup_registry().await;

        let first = registry.allocate("dom_greeting").await.unwrap();
        let second = registry.allocate("dom_farewell").await.unwrap();
        let generic = registry.allocate("something_else").await.unwrap();

        assert_eq!(first.identifier, "dh0");
        assert_eq!(first.matched_prefix, "dom_");
        assert_eq!(second.identifier, "dh1");
        assert_eq!(generic.identifier, "0");
        assert_eq!(generic.matched_prefix, GENERIC_PREFIX);
    }

    #[tokio::test]
    async fn test_allocate_without_generic_fails() {
        let store = SqliteDocumentStore::in_memory().await.unwrap();
        let registry = PrefixRegistry::new(Arc::new(store));

        let result = registry.allocate("whatever").await;
        assert!(matches!(result, Err(Error::RegistryNotFound(p)) if p == GENERIC_PREFIX));
    }

    #[tokio::test]
    async fn test_initialize_requires_generic() {
        let store = SqliteDocumentStore::in_memory().await.unwrap();
        let registry = PrefixRegistry::new(Arc::new(store));

        let missing = vec![("dom_".to_string(), "dh".to_string())];
        assert!(matches!(
            registry.initialize(&missing).await,
            Err(Error::InvalidInput(_))
        ));

        let non_empty = vec![(GENERIC_PREFIX.to_string(), "g".to_string())];
        assert!(matches!(
            registry.initialize(&non_empty).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_initialize_rejects_duplicates() {
        let store = SqliteDocumentStore::in_memory().await.unwrap();
        let registry = PrefixRegistry::new(Arc::new(store));

        let duplicated = vec![
            ("dom_".to_string(), "dh".to_string()),
            ("dom_".to_string(), "dx".to_string()),
            (GENERIC_PREFIX.to_string(), String::new()),
        ];
        assert!(matches!(
            registry.initialize(&duplicated).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(registry.mappings().await.unwrap().is_empty());
    }

    fn table(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(f, i)| (f.to_string(), i.to_string()))
            .collect()
    }

    async fn empty_registry() -> PrefixRegistry {
        let store = SqliteDocumentStore::in_memory().await.unwrap();
        PrefixRegistry::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_initialize_rejects_shared_identifier_prefix() {
        let registry = empty_registry().await;

        let shared = table(&[("dom_", "dh"), ("dominic_", "dh"), (GENERIC_PREFIX, "")]);
        assert!(matches!(
            registry.initialize(&shared).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(registry.mappings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_rejects_empty_identifier_prefix_outside_generic() {
        let registry = empty_registry().await;

        let bare = table(&[("bob_", ""), (GENERIC_PREFIX, "")]);
        assert!(matches!(
            registry.initialize(&bare).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_initialize_rejects_identifier_prefix_ending_in_digit() {
        let registry = empty_registry().await;

        // "d" at 10 and "d1" at 0 would both produce "d10"
        let ambiguous = table(&[("dan_", "d"), ("dan2_", "d1"), (GENERIC_PREFIX, "")]);
        assert!(matches!(
            registry.initialize(&ambiguous).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_initialize_checks_stored_mappings_too() {
        let registry = setup_registry().await;

        // New mapping reuses "dh", already owned by the stored "dom_"
        let clashing = table(&[("dominic_", "dh"), (GENERIC_PREFIX, "")]);
        assert!(matches!(
            registry.initialize(&clashing).await,
            Err(Error::InvalidInput(_))
        ));

        // Renaming a stored mapping onto another's prefix
        let renamed = table(&[("jake_", "dh"), (GENERIC_PREFIX, "")]);
        assert!(matches!(
            registry.initialize(&renamed).await,
            Err(Error::InvalidInput(_))
        ));

        let mappings = registry.mappings().await.unwrap();
        assert_eq!(mappings.len(), DEFAULT_PREFIX_MAPPINGS.len());
        let jake = mappings.iter().find(|m| m.file_prefix == "jake_").unwrap();
        assert_eq!(jake.identifier_prefix, "ja");
    }

    #[tokio::test]
    async fn test_initialize_allows_swapping_prefix_to_unused_one() {
        let registry = setup_registry().await;

        let renamed = table(&[("jake_", "jk"), (GENERIC_PREFIX, "")]);
        registry.initialize(&renamed).await.unwrap();
        assert_eq!(registry.allocate("jake_a").await.unwrap().identifier, "jk0");
    }

    #[tokio::test]
    async fn test_initialize_twice_upserts() {
        let registry = setup_registry().await;
        registry.allocate("dom_a").await.unwrap();

        let mut updated = default_mappings();
        for (file_prefix, identifier_prefix) in updated.iter_mut() {
            if file_prefix == "dom_" {
                *identifier_prefix = "dz".to_string();
            }
        }
        registry.initialize(&updated).await.unwrap();

        let mappings = registry.mappings().await.unwrap();
        assert_eq!(mappings.len(), DEFAULT_PREFIX_MAPPINGS.len());

        // Counter survives re-initialization
        let next = registry.allocate("dom_b").await.unwrap();
        assert_eq!(next.identifier, "dz1");
    }

    #[tokio::test]
    async fn test_reset_counters() {
        let registry = setup_registry().await;
        registry.allocate("dom_a").await.unwrap();
        registry.allocate("jake_a").await.unwrap();

        let reset = registry.reset_counters().await.unwrap();
        assert_eq!(reset, DEFAULT_PREFIX_MAPPINGS.len() as u64);
        assert!(registry
            .mappings()
            .await
            .unwrap()
            .iter()
            .all(|m| m.next_id == 0));

        assert_eq!(registry.allocate("dom_b").await.unwrap().identifier, "dh0");
    }
}
