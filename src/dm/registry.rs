//! Read-only package registry.
//!
//! Loaded once from the manifest an external packaging component maintains,
//! then shared across all workers without synchronization. The core only
//! checks field presence; archive construction and hosting live elsewhere.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use super::update::PackageDescriptor;
use crate::error::{DmError, Result};

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    packages: Vec<PackageDescriptor>,
}

/// Immutable package registry handed to the rule engine.
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    packages: Vec<PackageDescriptor>,
}

impl PackageRegistry {
    /// Registry with no packages; every evaluation yields "no update".
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from already-loaded descriptors.
    pub fn from_packages(packages: Vec<PackageDescriptor>) -> Self {
        Self { packages }
    }

    /// Load the manifest file, filling in download URLs from `base_url`
    /// for entries that carry only a filename.
    pub fn load(path: impl AsRef<Path>, base_url: &str) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DmError::Registry(format!("cannot read manifest {}: {e}", path.display()))
        })?;
        let manifest: Manifest = serde_json::from_str(&content)
            .map_err(|e| DmError::Registry(format!("malformed manifest: {e}")))?;

        let mut packages = manifest.packages;
        for pkg in &mut packages {
            if pkg.name.is_empty() || pkg.filename.is_empty() {
                return Err(DmError::Registry(format!(
                    "manifest entry missing name or filename: {pkg:?}"
                )));
            }
            if pkg.url.is_empty() {
                pkg.url = format!(
                    "{}/packages/{}",
                    base_url.trim_end_matches('/'),
                    pkg.filename
                );
            }
        }

        info!(count = packages.len(), path = %path.display(), "loaded package manifest");
        Ok(Self { packages })
    }

    /// All descriptors, in manifest order.
    pub fn packages(&self) -> &[PackageDescriptor] {
        &self.packages
    }

    /// Number of packages.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the registry holds no packages.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_manifest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "packages": [
                    {{
                        "name": "webos-doctor",
                        "version": "3.0.5",
                        "filename": "webos-doctor.ipk",
                        "size": 1048576,
                        "md5": "0cc175b9c0f1b6a831c399e269772661",
                        "target_build": "Nova-3.0.5-86"
                    }}
                ]
            }}"#
        )
        .unwrap();

        let registry =
            PackageRegistry::load(file.path(), "https://updates.example.net/").unwrap();
        assert_eq!(registry.len(), 1);

        let pkg = &registry.packages()[0];
        assert_eq!(pkg.name, "webos-doctor");
        assert_eq!(
            pkg.url,
            "https://updates.example.net/packages/webos-doctor.ipk"
        );
    }

    #[test]
    fn test_explicit_url_preserved() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"packages": [{{"name": "a", "version": "1", "filename": "a.ipk",
                 "url": "https://mirror.example.org/a.ipk"}}]}}"#
        )
        .unwrap();

        let registry = PackageRegistry::load(file.path(), "https://updates.example.net").unwrap();
        assert_eq!(registry.packages()[0].url, "https://mirror.example.org/a.ipk");
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"packages": [{{"name": "", "version": "1", "filename": "x"}}]}}"#)
            .unwrap();
        assert!(matches!(
            PackageRegistry::load(file.path(), "https://u.example.net"),
            Err(DmError::Registry(_))
        ));
    }

    #[test]
    fn test_missing_file_rejected() {
        assert!(PackageRegistry::load("/nonexistent/manifest.json", "x").is_err());
    }

    #[test]
    fn test_empty_manifest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();
        let registry = PackageRegistry::load(file.path(), "x").unwrap();
        assert!(registry.is_empty());
    }
}
