// src/core/registration.rs

//! Binding of script annotations (`help`, `compgen`, `flag`) to callables
//! whose public name is not known yet, and the reconciliation pass that names
//! them once the script has populated its commands table.
//!
//! The join key is callable identity: an annotation creates (or finds) the
//! record for the function value, and the later scan of the commands table
//! renames that record from its synthetic name to the key it was assigned to.

use crate::core::registry::{Registry, RegistryError};
use crate::models::{CompletionStrategy, TargetId};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Flags can not be declared on the default target.")]
    FlagsOnDefault,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

fn is_default<F: PartialEq>(callable: &F, default: Option<&F>) -> bool {
    default.is_some_and(|d| d == callable)
}

/// Finds or creates the record for `callable`, moving it to the default slot
/// when `callable` is the designated default target.
fn bind_annotated<F: Clone + PartialEq>(
    registry: &mut Registry<F>,
    callable: &F,
    default: Option<&F>,
) -> Result<TargetId, RegistryError> {
    let (id, name) = registry.get_or_create(callable);
    if is_default(callable, default) && !name.is_empty() {
        registry.rename(&name, "")?;
    }
    Ok(id)
}

/// Attaches help text to `callable`.
pub fn declare_help<F: Clone + PartialEq>(
    registry: &mut Registry<F>,
    callable: &F,
    default: Option<&F>,
    text: String,
) -> Result<(), RegistrationError> {
    let id = bind_annotated(registry, callable, default)?;
    if let Some(target) = registry.by_id_mut(id) {
        log::debug!("Declared help for target {}", id);
        target.help = text;
    }
    Ok(())
}

/// Attaches a completion strategy to `callable`.
pub fn declare_compgen<F: Clone + PartialEq>(
    registry: &mut Registry<F>,
    callable: &F,
    default: Option<&F>,
    strategy: CompletionStrategy<F>,
) -> Result<(), RegistrationError> {
    let id = bind_annotated(registry, callable, default)?;
    if let Some(target) = registry.by_id_mut(id) {
        log::debug!("Declared completion for target {}", id);
        target.completion = strategy;
    }
    Ok(())
}

/// Attaches a flag-setup callable to `callable`. The default target takes no flags.
pub fn declare_flags<F: Clone + PartialEq>(
    registry: &mut Registry<F>,
    callable: &F,
    default: Option<&F>,
    setup: F,
) -> Result<(), RegistrationError> {
    if is_default(callable, default) {
        return Err(RegistrationError::FlagsOnDefault);
    }
    let (id, _) = registry.get_or_create(callable);
    if let Some(target) = registry.by_id_mut(id) {
        log::debug!("Declared flags for target {}", id);
        target.flag_setup = Some(setup);
    }
    Ok(())
}

/// Gives `callable` the public name `name`.
///
/// A placeholder is renamed; a record that already has a public name (the
/// function sits in several slots, or is also the default) gains `name` as an
/// additional key.
fn assign<F: Clone + PartialEq>(
    registry: &mut Registry<F>,
    callable: &F,
    name: &str,
) -> Result<TargetId, RegistryError> {
    let (id, current) = registry.get_or_create(callable);
    let already_named = registry.by_id(id).is_some_and(|t| t.is_valid());
    if already_named {
        if current != name {
            registry.alias(&current, name)?;
        }
    } else {
        registry.rename(&current, name)?;
    }
    Ok(id)
}

/// Runs once after the script finished loading.
///
/// * every `(name, callable)` of the commands table is assigned its name;
/// * a real default callable is placed at `""` unless that slot is taken;
/// * targets without help fall back to `docstring(callable)`;
/// * finally the registry is validated.
pub fn reconcile<F, I, D>(
    registry: &mut Registry<F>,
    commands: I,
    default: Option<&F>,
    docstring: D,
) -> Result<(), RegistryError>
where
    F: Clone + PartialEq,
    I: IntoIterator<Item = (String, F)>,
    D: Fn(&F) -> Option<String>,
{
    let mut assigned = Vec::new();
    for (name, callable) in commands {
        log::debug!(" * {} [target]", name);
        assigned.push(assign(registry, &callable, &name)?);
    }

    if let Some(default) = default {
        if !registry.contains("") {
            log::debug!("Adding default target");
            assigned.push(assign(registry, default, "")?);
        }
    }

    for id in assigned {
        if let Some(target) = registry.by_id_mut(id) {
            if target.help.is_empty() {
                if let Some(doc) = docstring(&target.callable) {
                    target.help = doc;
                }
            }
        }
    }

    registry.validate()
}

// MARK: --- UNIT TESTS ---
