//! Dependency checks between module manifests.

use crate::error::ModuleLoadError;
use crate::manifest::ModuleManifest;
use std::collections::HashSet;
use tracing::warn;

fn find_known<'a, T: AsRef<ModuleManifest>>(known: &'a [T], name: &str) -> Option<&'a ModuleManifest> {
    known
        .iter()
        .map(AsRef::as_ref)
        .find(|manifest| manifest.name == name)
}

/// Names reachable from `manifest` through declared module dependencies.
///
/// Names are expanded through the known manifests only; unknown names are
/// part of the closure but lead nowhere. The manifest itself is not part of
/// the result unless some dependency leads back to it.
pub fn transitive_dependencies<T: AsRef<ModuleManifest>>(
    manifest: &ModuleManifest,
    known: &[T],
) -> Vec<String> {
    let mut closure = Vec::new();
    let mut visited = HashSet::new();
    let mut pending: Vec<&str> = manifest
        .module_dependencies
        .iter()
        .rev()
        .map(String::as_str)
        .collect();

    while let Some(name) = pending.pop() {
        if !visited.insert(name) {
            continue;
        }
        closure.push(name.to_string());
        if let Some(dependency) = find_known(known, name) {
            pending.extend(dependency.module_dependencies.iter().rev().map(String::as_str));
        }
    }
    closure
}

/// Whether `manifest` depends on `other`, directly or transitively.
pub fn depends_on<T: AsRef<ModuleManifest>>(manifest: &ModuleManifest, other: &str, known: &[T]) -> bool {
    transitive_dependencies(manifest, known)
        .iter()
        .any(|name| name == other)
}

pub fn check_self_dependency<T: AsRef<ModuleManifest>>(
    manifest: &ModuleManifest,
    known: &[T],
) -> Result<(), ModuleLoadError> {
    if depends_on(manifest, &manifest.name, known) {
        return Err(ModuleLoadError::SelfDependency {
            module: manifest.name.clone(),
        });
    }
    Ok(())
}

pub fn check_missing_dependencies<T: AsRef<ModuleManifest>>(
    manifest: &ModuleManifest,
    known: &[T],
) -> Result<(), ModuleLoadError> {
    let missing: Vec<String> = manifest
        .module_dependencies
        .iter()
        .filter(|name| find_known(known, name).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ModuleLoadError::MissingDependencies {
            module: manifest.name.clone(),
            missing,
        });
    }
    Ok(())
}

/// Fails when a module in the closure of `manifest` depends back on it.
pub fn check_circular_dependencies<T: AsRef<ModuleManifest>>(
    manifest: &ModuleManifest,
    known: &[T],
) -> Result<(), ModuleLoadError> {
    let chain: Vec<String> = transitive_dependencies(manifest, known)
        .into_iter()
        .filter(|name| *name != manifest.name)
        .filter(|name| {
            find_known(known, name)
                .is_some_and(|dependency| depends_on(dependency, &manifest.name, known))
        })
        .collect();
    if !chain.is_empty() {
        return Err(ModuleLoadError::CircularDependency {
            module: manifest.name.clone(),
            chain,
        });
    }
    Ok(())
}

/// Runs every check for one manifest, stopping at the first failure.
pub fn validate<T: AsRef<ModuleManifest>>(manifest: &ModuleManifest, known: &[T]) -> Result<(), ModuleLoadError> {
    check_self_dependency(manifest, known)?;
    check_missing_dependencies(manifest, known)?;
    check_circular_dependencies(manifest, known)?;
    Ok(())
}

/// Validates every known manifest and returns the ones that may be loaded.
///
/// Each failure is passed to `report` and the manifest is excluded. Excluding
/// a manifest can strand the manifests that depend on it; those are reported
/// as missing dependencies and excluded too, until nothing changes.
pub fn validate_all<T, F>(known: &[T], mut report: F) -> Vec<T>
where
    T: AsRef<ModuleManifest> + Clone,
    F: FnMut(ModuleLoadError),
{
    let mut survivors: Vec<T> = Vec::new();
    for candidate in known {
        match validate(candidate.as_ref(), known) {
            Ok(()) => survivors.push(candidate.clone()),
            Err(error) => {
                warn!("❌ {}", error);
                report(error);
            }
        }
    }

    loop {
        let (kept, stranded): (Vec<T>, Vec<T>) = survivors
            .iter()
            .cloned()
            .partition(|candidate| check_missing_dependencies(candidate.as_ref(), &survivors).is_ok());
        if stranded.is_empty() {
            return kept;
        }
        for candidate in &stranded {
            if let Err(error) = check_missing_dependencies(candidate.as_ref(), &survivors) {
                warn!("❌ {}", error);
                report(error);
            }
        }
        survivors = kept;
    }
}
