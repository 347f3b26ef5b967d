//! Load ordering for a set of validated manifests.

use crate::error::ModuleLoadError;
use crate::manifest::ModuleManifest;
use std::collections::HashSet;

/// Flattens `manifests` into a sequence where every module comes after all
/// of the modules it depends on. Each manifest appears exactly once.
///
/// Dependencies are looked up inside `manifests` only. A dependency that is
/// not part of the set aborts the whole pass.
pub fn compute_load_order<T>(manifests: &[T]) -> Result<Vec<T>, ModuleLoadError>
where
    T: AsRef<ModuleManifest> + Clone,
{
    let mut ordered = Vec::with_capacity(manifests.len());
    let mut placed = HashSet::new();
    let mut in_progress = Vec::new();

    for manifest in manifests {
        place(manifest, manifests, &mut placed, &mut in_progress, &mut ordered)?;
    }
    Ok(ordered)
}

fn place<'a, T>(
    manifest: &'a T,
    manifests: &'a [T],
    placed: &mut HashSet<&'a str>,
    in_progress: &mut Vec<&'a str>,
    ordered: &mut Vec<T>,
) -> Result<(), ModuleLoadError>
where
    T: AsRef<ModuleManifest> + Clone,
{
    let name = manifest.as_ref().name.as_str();
    if placed.contains(name) {
        return Ok(());
    }
    if let Some(position) = in_progress.iter().position(|entry| *entry == name) {
        return Err(ModuleLoadError::CircularDependency {
            module: name.to_string(),
            chain: in_progress[position..].iter().map(|entry| entry.to_string()).collect(),
        });
    }

    let mut dependencies = Vec::new();
    let mut missing = Vec::new();
    for dependency_name in &manifest.as_ref().module_dependencies {
        match manifests
            .iter()
            .find(|candidate| candidate.as_ref().name == *dependency_name)
        {
            Some(dependency) => dependencies.push(dependency),
            None => missing.push(dependency_name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(ModuleLoadError::MissingDependencies {
            module: name.to_string(),
            missing,
        });
    }

    in_progress.push(name);
    for dependency in dependencies {
        place(dependency, manifests, placed, in_progress, ordered)?;
    }
    in_progress.pop();

    placed.insert(name);
    ordered.push(manifest.clone());
    Ok(())
}
