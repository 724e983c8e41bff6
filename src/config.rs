use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};
use crate::path::GuestPath;
use crate::patch::PatchSpec;
use crate::registry::{PatchRegistry, RegistryBuilder};
use crate::transform::Transformation;

/// patch catalogue stored as toml
///
/// ```toml
/// [[patch]]
/// path = "/etc/fstab"
/// transformation = { kind = "remove_label_line", label = "LABEL=cloudimg-rootfs" }
///
/// [[release."Ubuntu-22.04".patch]]
/// path = "/etc/wsl.conf"
/// transformation = { kind = "append", contents = "[boot]\nsystemd=true\n" }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// patches for every release
    #[serde(default, rename = "patch", skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<PatchEntry>,
    /// extra patches keyed by release
    #[serde(default, rename = "release", skip_serializing_if = "BTreeMap::is_empty")]
    pub releases: BTreeMap<String, ReleaseEntry>,
}

/// patches for one release
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReleaseEntry {
    #[serde(default, rename = "patch")]
    pub patches: Vec<PatchEntry>,
}

/// one configured patch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub path: GuestPath,
    pub transformation: Transformation,
}

impl From<PatchEntry> for PatchSpec {
    fn from(entry: PatchEntry) -> Self {
        PatchSpec::new(entry.path, entry.transformation)
    }
}

impl RegistryConfig {
    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        Self::parse(&content)
    }

    /// parse config from a toml string
    pub fn parse(content: &str) -> Result<Self> {
        let config: RegistryConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// add a patch for every release
    pub fn add_patch(&mut self, path: GuestPath, transformation: Transformation) {
        self.patches.push(PatchEntry {
            path,
            transformation,
        });
    }

    /// add a patch for one release
    pub fn add_release_patch(
        &mut self,
        release: impl Into<String>,
        path: GuestPath,
        transformation: Transformation,
    ) {
        self.releases
            .entry(release.into())
            .or_default()
            .patches
            .push(PatchEntry {
                path,
                transformation,
            });
    }

    /// patches as a builder, in file order
    pub fn into_builder(self) -> RegistryBuilder {
        let mut builder = RegistryBuilder::default();
        for entry in self.patches {
            builder = builder.release_agnostic(entry.into());
        }
        for (release, entry) in self.releases {
            for patch in entry.patches {
                builder = builder.release_specific(release.clone(), patch.into());
            }
        }
        builder
    }

    /// build the registry, checking for conflicting owners
    pub fn into_registry(self) -> Result<PatchRegistry> {
        self.into_builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
[[patch]]
path = "/etc/fstab"
transformation = { kind = "remove_label_line", label = "LABEL=cloudimg-rootfs" }

[[release."Ubuntu-22.04".patch]]
path = "/etc/wsl.conf"
transformation = { kind = "append", contents = "[boot]\nsystemd=true\n" }

[[release."Ubuntu-22.04".patch]]
path = "/etc/systemd/system/funny.service.d/00-wsl.conf"
transformation = { kind = "replace", contents = "[Unit]\nDisable=Forever\n" }
"#;

    #[test]
    fn test_config_parse_sample() {
        let config = RegistryConfig::parse(SAMPLE).unwrap();

        assert_eq!(config.patches.len(), 1);
        assert_eq!(
            config.patches[0].transformation,
            Transformation::remove_cloud_img_label()
        );
        assert_eq!(config.releases["Ubuntu-22.04"].patches.len(), 2);
    }

    #[test]
    fn test_config_into_registry() {
        let registry = RegistryConfig::parse(SAMPLE)
            .unwrap()
            .into_registry()
            .unwrap();

        assert_eq!(registry.effective_patches("Ubuntu-22.04").len(), 3);
        assert_eq!(registry.effective_patches("Ubuntu-20.04").len(), 1);
        assert_eq!(
            registry
                .find_for("Ubuntu-22.04", "/etc/wsl.conf")
                .unwrap()
                .transformation,
            Transformation::append("[boot]\nsystemd=true\n")
        );
    }

    #[test]
    fn test_config_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("patches.toml");

        let mut config = RegistryConfig::default();
        config.add_patch(
            GuestPath::parse("/etc/fstab").unwrap(),
            Transformation::remove_cloud_img_label(),
        );
        config.add_release_patch(
            "Ubuntu-22.04",
            GuestPath::parse("/etc/wsl.conf").unwrap(),
            Transformation::ensure_contains("[boot]\nsystemd=true\n"),
        );
        config.save(&path).unwrap();

        let loaded = RegistryConfig::load(&path).unwrap();
        assert_eq!(loaded.patches, config.patches);
        assert_eq!(
            loaded.releases["Ubuntu-22.04"].patches,
            config.releases["Ubuntu-22.04"].patches
        );
    }

    #[test]
    fn test_config_empty() {
        let config = RegistryConfig::parse("").unwrap();
        assert!(config.patches.is_empty());
        assert!(config.releases.is_empty());
    }

    #[test]
    fn test_config_rejects_relative_path() {
        let result = RegistryConfig::parse(
            r#"
[[patch]]
path = "etc/fstab"
transformation = { kind = "replace", contents = "" }
"#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_config_rejects_unknown_kind() {
        let result = RegistryConfig::parse(
            r#"
[[patch]]
path = "/etc/fstab"
transformation = { kind = "custom" }
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_load_missing() {
        let dir = tempdir().unwrap();
        let result = RegistryConfig::load(&dir.path().join("nope.toml"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
