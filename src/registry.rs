//! which patches apply to which distro release
//!
//! the registry is built once and read-only afterwards. pass it to whatever
//! runs the setup instead of keeping it in a global.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::path::GuestPath;
use crate::patch::PatchSpec;
use crate::transform::Transformation;

/// immutable table of patches
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatchRegistry {
    release_agnostic: Vec<PatchSpec>,
    release_specific: BTreeMap<String, Vec<PatchSpec>>,
}

impl PatchRegistry {
    /// start an empty registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// the patches every WSL distro needs
    pub fn builtin() -> Result<Self> {
        builtin_builder()?.build()
    }

    /// patches applied to every release, in registration order
    pub fn release_agnostic(&self) -> &[PatchSpec] {
        &self.release_agnostic
    }

    /// patches registered only for `release`
    pub fn release_specific(&self, release: &str) -> &[PatchSpec] {
        self.release_specific
            .get(release)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// releases with at least one release-specific patch
    pub fn releases(&self) -> impl Iterator<Item = &str> {
        self.release_specific.keys().map(String::as_str)
    }

    /// everything to apply for `release`: the agnostic set, then that
    /// release's own patches. an unknown release gets only the agnostic set.
    pub fn effective_patches(&self, release: &str) -> Vec<PatchSpec> {
        self.release_agnostic
            .iter()
            .chain(self.release_specific(release))
            .cloned()
            .collect()
    }

    /// release-agnostic patch owning `path`
    pub fn find(&self, path: &str) -> Option<&PatchSpec> {
        self.release_agnostic.iter().find(|p| p.path.as_str() == path)
    }

    /// patch owning `path` for `release`, agnostic or specific
    pub fn find_for(&self, release: &str, path: &str) -> Option<&PatchSpec> {
        self.find(path).or_else(|| {
            self.release_specific(release)
                .iter()
                .find(|p| p.path.as_str() == path)
        })
    }

    /// true if an equal patch is registered for all releases
    pub fn is_release_agnostic(&self, spec: &PatchSpec) -> bool {
        self.release_agnostic.contains(spec)
    }

    /// copy of this registry as a builder, for layering more patches on top
    pub fn to_builder(&self) -> RegistryBuilder {
        RegistryBuilder {
            release_agnostic: self.release_agnostic.clone(),
            release_specific: self.release_specific.clone(),
        }
    }
}

/// collects patches, then checks ownership in [`RegistryBuilder::build`]
///
/// registering the same path twice in one set replaces the earlier patch in
/// place: the last registration wins and keeps the first one's position.
#[derive(Clone, Debug, Default)]
pub struct RegistryBuilder {
    release_agnostic: Vec<PatchSpec>,
    release_specific: BTreeMap<String, Vec<PatchSpec>>,
}

impl RegistryBuilder {
    /// register a patch for every release
    pub fn release_agnostic(mut self, spec: PatchSpec) -> Self {
        upsert(&mut self.release_agnostic, spec);
        self
    }

    /// register a patch for one release only
    pub fn release_specific(mut self, release: impl Into<String>, spec: PatchSpec) -> Self {
        upsert(self.release_specific.entry(release.into()).or_default(), spec);
        self
    }

    /// merge another builder's patches on top of this one
    pub fn merge(mut self, other: RegistryBuilder) -> Self {
        for spec in other.release_agnostic {
            upsert(&mut self.release_agnostic, spec);
        }
        for (release, specs) in other.release_specific {
            let set = self.release_specific.entry(release).or_default();
            for spec in specs {
                upsert(set, spec);
            }
        }
        self
    }

    /// fails if a file is claimed both by the agnostic set and by a release
    pub fn build(self) -> Result<PatchRegistry> {
        for (release, specs) in &self.release_specific {
            if let Some(spec) = specs
                .iter()
                .find(|s| self.release_agnostic.iter().any(|a| a.path == s.path))
            {
                return Err(Error::PatchConflict {
                    path: spec.path.to_string(),
                    release: release.clone(),
                });
            }
        }

        Ok(PatchRegistry {
            release_agnostic: self.release_agnostic,
            release_specific: self
                .release_specific
                .into_iter()
                .filter(|(_, specs)| !specs.is_empty())
                .collect(),
        })
    }
}

fn upsert(set: &mut Vec<PatchSpec>, spec: PatchSpec) {
    match set.iter_mut().find(|s| s.path == spec.path) {
        Some(existing) => *existing = spec,
        None => set.push(spec),
    }
}

fn builtin_builder() -> Result<RegistryBuilder> {
    Ok(RegistryBuilder::default().release_agnostic(PatchSpec::new(
        GuestPath::parse("/etc/fstab")?,
        Transformation::remove_cloud_img_label(),
    )))
}
