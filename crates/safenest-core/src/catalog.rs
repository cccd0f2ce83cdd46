//! # App Catalog
//!
//! The catalog is owned by the backend; the activation workflow receives it
//! as input and only filters it by the child's derived age.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::AppId;

/// One app that may be placed on a device's allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCatalogEntry {
    /// Catalog identifier.
    pub id: AppId,
    /// Display name.
    pub name: String,
    /// Youngest age the app is offered for. `None` means no lower bound.
    #[serde(default)]
    pub min_age: Option<u32>,
    /// Oldest age the app is offered for. `None` means no upper bound.
    #[serde(default)]
    pub max_age: Option<u32>,
}

impl AppCatalogEntry {
    /// Whether this app is offered for a child of `age`.
    pub fn eligible_for(&self, age: u32) -> bool {
        self.min_age.map_or(true, |min| age >= min) && self.max_age.map_or(true, |max| age <= max)
    }
}

/// An immutable snapshot of the app catalog, keyed by [`AppId`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppCatalog {
    entries: BTreeMap<AppId, AppCatalogEntry>,
}

impl AppCatalog {
    /// Build a catalog. Later duplicates of an id replace earlier ones.
    pub fn new(entries: impl IntoIterator<Item = AppCatalogEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    /// Entries offered for a child of `age`, in id order.
    pub fn eligible_for(&self, age: u32) -> Vec<&AppCatalogEntry> {
        self.entries.values().filter(|e| e.eligible_for(age)).collect()
    }

    /// Look up an entry by id.
    pub fn get(&self, id: &AppId) -> Option<&AppCatalogEntry> {
        self.entries.get(id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate an allow-list against this catalog for a child of `age`.
    ///
    /// Duplicates collapse; the result is order-irrelevant.
    ///
    /// # Errors
    ///
    /// [`ValidationError::UnknownApp`] for ids not in the catalog and
    /// [`ValidationError::AppNotEligible`] for apps outside the age bounds.
    pub fn validate_selection(
        &self,
        age: u32,
        selection: impl IntoIterator<Item = AppId>,
    ) -> Result<BTreeSet<AppId>, ValidationError> {
        let mut out = BTreeSet::new();
        for id in selection {
            let entry = self
                .entries
                .get(&id)
                .ok_or_else(|| ValidationError::UnknownApp(id.to_string()))?;
            if !entry.eligible_for(age) {
                return Err(ValidationError::AppNotEligible {
                    app: id.to_string(),
                    age,
                });
            }
            out.insert(id);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(id: &str, min: Option<u32>, max: Option<u32>) -> AppCatalogEntry {
        AppCatalogEntry {
            id: AppId::new(id).unwrap(),
            name: id.to_uppercase(),
            min_age: min,
            max_age: max,
        }
    }

    fn catalog() -> AppCatalog {
        AppCatalog::new([
            entry("khan", None, None),
            entry("youtube-kids", None, Some(12)),
            entry("discord", Some(13), None),
            entry("minecraft", Some(7), Some(17)),
        ])
    }

    #[test]
    fn filters_by_age_bounds() {
        let cat = catalog();
        let ids: Vec<&str> = cat
            .eligible_for(8)
            .into_iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["khan", "minecraft", "youtube-kids"]);

        let ids: Vec<&str> = cat
            .eligible_for(13)
            .into_iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["discord", "khan", "minecraft"]);
    }

    #[test]
    fn bounds_are_inclusive() {
        let e = entry("x", Some(7), Some(12));
        assert!(!e.eligible_for(6));
        assert!(e.eligible_for(7));
        assert!(e.eligible_for(12));
        assert!(!e.eligible_for(13));
    }

    #[test]
    fn selection_collapses_duplicates() {
        let ids = ["khan", "khan", "minecraft"].map(|s| AppId::new(s).unwrap());
        let set = catalog().validate_selection(9, ids).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn selection_rejects_unknown_and_ineligible() {
        let err = catalog()
            .validate_selection(9, [AppId::new("fortnite").unwrap()])
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownApp("fortnite".into()));

        let err = catalog()
            .validate_selection(9, [AppId::new("discord").unwrap()])
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::AppNotEligible {
                app: "discord".into(),
                age: 9
            }
        );
    }

    #[test]
    fn entry_deserializes_without_bounds() {
        let e: AppCatalogEntry =
            serde_json::from_value(serde_json::json!({"id": "a1", "name": "App"})).unwrap();
        assert!(e.min_age.is_none());
        assert!(e.eligible_for(0));
    }

    proptest! {
        /// Every eligible entry passes selection validation at that age.
        #[test]
        fn eligible_entries_always_validate(age in 0u32..20) {
            let cat = catalog();
            let ids: Vec<AppId> = cat.eligible_for(age).into_iter().map(|e| e.id.clone()).collect();
            let set = cat.validate_selection(age, ids.clone()).unwrap();
            prop_assert_eq!(set.len(), ids.len());
        }
    }
}
