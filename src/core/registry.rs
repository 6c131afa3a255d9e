// src/core/registry.rs

use crate::models::{Target, TargetId};
use std::collections::HashMap;
use thiserror::Error;

/// Represents errors that can occur while building or validating the registry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// A rename or alias referred to a name that has no entry.
    #[error("No target registered under '{name}'.")]
    NotFound { name: String },
    /// Metadata was attached to a function that never received a public name.
    #[error(
        "Target metadata was declared for a function that is not exposed as a target. Valid targets: {}",
        display_names(.valid)
    )]
    Unreconciled {
        /// Every name that did reconcile, sorted.
        valid: Vec<String>,
    },
}

fn display_names(names: &[String]) -> String {
    names
        .iter()
        .map(|n| if n.is_empty() { crate::constants::DEFAULT_TARGET_DISPLAY } else { n })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Owns every `Target` record.
///
/// Records live in an arena indexed by `TargetId` and are never moved or
/// removed; names are a separate `name -> id` index. Renaming only touches the
/// index, so a record keeps its identity (and callable) for its whole life.
#[derive(Debug, Clone)]
pub struct Registry<F> {
    targets: Vec<Target<F>>,
    names: HashMap<String, TargetId>,
}

impl<F> Default for Registry<F> {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            names: HashMap::new(),
        }
    }
}

impl<F: Clone + PartialEq> Registry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the record for `callable` by identity, creating an invalid
    /// placeholder under a fresh synthetic name when none exists.
    ///
    /// Returns the record's id and the name it is currently indexed under.
    pub fn get_or_create(&mut self, callable: &F) -> (TargetId, String) {
        let existing = self
            .targets
            .iter()
            .find(|t| t.callable == *callable && self.is_reachable(t.id));
        if let Some(target) = existing {
            return (target.id, target.name.clone());
        }

        let id = TargetId(self.targets.len());
        let synthetic = format!("<anonymous{}>", id);
        log::debug!("Registering placeholder target {} as '{}'", id, synthetic);
        self.targets
            .push(Target::placeholder(id, callable.clone(), synthetic.clone()));
        self.names.insert(synthetic.clone(), id);
        (id, synthetic)
    }

    /// Moves the entry at `old` to `new` and marks it valid.
    ///
    /// An entry already sitting at `new` is replaced (last writer wins).
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), RegistryError> {
        let id = self
            .names
            .remove(old)
            .ok_or_else(|| RegistryError::NotFound {
                name: old.to_string(),
            })?;

        if let Some(displaced) = self.names.insert(new.to_string(), id) {
            if displaced != id {
                log::debug!("Target '{}' replaced record {}", new, displaced);
            }
        }
        if let Some(target) = self.targets.get_mut(id.0) {
            target.name = new.to_string();
            target.valid = true;
        }
        log::debug!("Renamed target {} from '{}' to '{}'", id, old, new);
        Ok(())
    }

    /// Makes the entry at `existing` additionally reachable as `alias`.
    pub fn alias(&mut self, existing: &str, alias: &str) -> Result<(), RegistryError> {
        let id = *self
            .names
            .get(existing)
            .ok_or_else(|| RegistryError::NotFound {
                name: existing.to_string(),
            })?;
        self.names.insert(alias.to_string(), id);
        log::debug!("Target {} is also reachable as '{}'", id, alias);
        Ok(())
    }

    /// Fails when any reachable record is still an unreconciled placeholder.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let has_invalid = self
            .names
            .values()
            .filter_map(|id| self.targets.get(id.0))
            .any(|t| !t.valid);

        if has_invalid {
            let mut valid = self
                .names
                .iter()
                .filter(|(_, id)| self.targets.get(id.0).is_some_and(|t| t.valid))
                .map(|(name, _)| name.clone())
                .collect::<Vec<_>>();
            valid.sort();
            return Err(RegistryError::Unreconciled { valid });
        }
        Ok(())
    }
}

impl<F> Registry<F> {
    pub fn get(&self, name: &str) -> Option<&Target<F>> {
        self.names.get(name).and_then(|id| self.targets.get(id.0))
    }

    pub fn by_id(&self, id: TargetId) -> Option<&Target<F>> {
        self.targets.get(id.0)
    }

    pub fn by_id_mut(&mut self, id: TargetId) -> Option<&mut Target<F>> {
        self.targets.get_mut(id.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Every name in the index (the default target's `""` included), sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// `(name, target)` pairs sorted by name.
    pub fn entries(&self) -> Vec<(&str, &Target<F>)> {
        self.names()
            .into_iter()
            .filter_map(|name| self.get(name).map(|t| (name, t)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn is_reachable(&self, id: TargetId) -> bool {
        self.names.values().any(|&i| i == id)
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_returns_same_record_for_same_callable() {
        let mut registry = Registry::new();
        let (first, first_name) = registry.get_or_create(&"build");
        let (second, second_name) = registry.get_or_create(&"build");

        assert_eq!(first, second);
        assert_eq!(first_name, second_name);
        assert_eq!(registry.len(), 1);
        assert!(!registry.get(&first_name).unwrap().is_valid());
    }

    #[test]
    fn test_get_or_create_distinct_callables_get_distinct_names() {
        let mut registry = Registry::new();
        let (a, a_name) = registry.get_or_create(&1);
        let (b, b_name) = registry.get_or_create(&2);
        assert_ne!(a, b);
        assert_ne!(a_name, b_name);
    }

    #[test]
    fn test_rename_moves_entry_and_marks_valid() {
        let mut registry = Registry::new();
        let (id, synthetic) = registry.get_or_create(&"f");
        registry.rename(&synthetic, "build").unwrap();

        assert!(!registry.contains(&synthetic));
        let target = registry.get("build").unwrap();
        assert_eq!(target.id(), id);
        assert_eq!(target.name(), "build");
        assert!(target.is_valid());
    }

    #[test]
    fn test_rename_missing_source_fails_without_mutation() {
        let mut registry = Registry::new();
        let (_, synthetic) = registry.get_or_create(&"f");

        let err = registry.rename("nope", "build").unwrap_err();
        assert_eq!(
            err,
            RegistryError::NotFound {
                name: "nope".to_string()
            }
        );
        assert_eq!(registry.names(), vec![synthetic.as_str()]);
        assert!(!registry.contains("build"));
    }

    #[test]
    fn test_rename_overwrites_existing_entry() {
        let mut registry = Registry::new();
        let (_, a) = registry.get_or_create(&"a");
        let (b_id, b) = registry.get_or_create(&"b");
        registry.rename(&a, "").unwrap();
        registry.rename(&b, "").unwrap();

        assert_eq!(registry.get("").unwrap().id(), b_id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_displaced_callable_gets_a_fresh_placeholder() {
        let mut registry = Registry::new();
        let (a_id, a) = registry.get_or_create(&"a");
        let (_, b) = registry.get_or_create(&"b");
        registry.rename(&a, "x").unwrap();
        registry.rename(&b, "x").unwrap();

        let (again, name) = registry.get_or_create(&"a");
        assert_ne!(again, a_id);
        assert!(!registry.get(&name).unwrap().is_valid());
    }

    #[test]
    fn test_alias_shares_the_record() {
        let mut registry = Registry::new();
        let (id, synthetic) = registry.get_or_create(&"f");
        registry.rename(&synthetic, "build").unwrap();
        registry.alias("build", "b").unwrap();

        assert_eq!(registry.get("b").unwrap().id(), id);
        assert_eq!(registry.names(), vec!["b", "build"]);
        assert!(registry.alias("missing", "m").is_err());
    }

    #[test]
    fn test_validate_lists_valid_names_on_failure() {
        let mut registry = Registry::new();
        let (_, a) = registry.get_or_create(&"a");
        registry.rename(&a, "zeta").unwrap();
        let (_, d) = registry.get_or_create(&"d");
        registry.rename(&d, "").unwrap();
        registry.get_or_create(&"orphan");

        match registry.validate() {
            Err(RegistryError::Unreconciled { valid }) => {
                assert_eq!(valid, vec!["".to_string(), "zeta".to_string()]);
            }
            other => panic!("expected Unreconciled, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_passes_when_everything_is_named() {
        let mut registry = Registry::new();
        let (_, a) = registry.get_or_create(&"a");
        registry.rename(&a, "a").unwrap();
        assert!(registry.validate().is_ok());
        assert!(Registry::<u8>::new().validate().is_ok());
    }

    #[test]
    fn test_entries_are_sorted_with_default_first() {
        let mut registry = Registry::new();
        for (callable, name) in [(1, "lint"), (2, ""), (3, "build")] {
            let (_, synthetic) = registry.get_or_create(&callable);
            registry.rename(&synthetic, name).unwrap();
        }
        let names: Vec<&str> = registry.entries().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["", "build", "lint"]);
    }
}
