//! Update eligibility rules.
//!
//! Pure given its two inputs: the device's reported build identifier and the
//! read-only package registry. No I/O, no mutable state.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// An update package as loaded from the external registry. Immutable once
/// loaded; the rule engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Package name.
    pub name: String,
    /// Package version string.
    pub version: String,
    /// Archive filename.
    pub filename: String,
    /// Stable download URL embedded in the offer.
    #[serde(default)]
    pub url: String,
    /// Archive size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Archive checksum.
    #[serde(default)]
    pub md5: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Minimum device build eligible for this package; empty = no floor.
    #[serde(default)]
    pub min_version: String,
    /// Build the package brings the device to.
    #[serde(default)]
    pub target_build: String,
}

/// A build identifier parsed into comparable numeric components.
///
/// `"Nova-3.0.5-64"` parses to `(3, 0, 5, 64)`; comparison is
/// component-wise numeric, so build "9" sorts below "10" within the same
/// major.minor. Non-numeric text is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BuildVersion([u32; 4]);

impl BuildVersion {
    /// Parse a build string. Missing components are zero.
    pub fn parse(build: &str) -> Self {
        let mut parts = [0u32; 4];
        let mut idx = 0;
        let mut current: Option<u64> = None;

        for ch in build.chars() {
            if let Some(digit) = ch.to_digit(10) {
                let value = current.unwrap_or(0) * 10 + u64::from(digit);
                current = Some(value.min(u64::from(u32::MAX)));
            } else if let Some(value) = current.take() {
                if idx < 4 {
                    parts[idx] = value as u32;
                    idx += 1;
                }
            }
        }
        if let Some(value) = current {
            if idx < 4 {
                parts[idx] = value as u32;
            }
        }

        Self(parts)
    }

    /// Numeric components, most significant first.
    pub fn components(&self) -> [u32; 4] {
        self.0
    }
}

/// Compare two build strings by component.
pub fn compare_builds(a: &str, b: &str) -> Ordering {
    BuildVersion::parse(a).cmp(&BuildVersion::parse(b))
}

/// Select the packages applicable to a device build, in registry order.
///
/// A descriptor is selected when the device is below its target build and
/// at or above its minimum version (when one is set).
pub fn evaluate<'a>(
    device_build: &str,
    registry: &'a [PackageDescriptor],
) -> Vec<&'a PackageDescriptor> {
    let device = BuildVersion::parse(device_build);

    registry
        .iter()
        .filter(|pkg| {
            if !pkg.min_version.is_empty() && device < BuildVersion::parse(&pkg.min_version) {
                return false;
            }
            device < BuildVersion::parse(&pkg.target_build)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str, target: &str, min: &str) -> PackageDescriptor {
        PackageDescriptor {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            filename: format!("{name}.ipk"),
            url: format!("https://updates.example.net/packages/{name}.ipk"),
            size: 4096,
            md5: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            description: String::new(),
            min_version: min.to_string(),
            target_build: target.to_string(),
        }
    }

    #[test]
    fn test_build_parse() {
        assert_eq!(
            BuildVersion::parse("Nova-3.0.5-64").components(),
            [3, 0, 5, 64]
        );
        assert_eq!(BuildVersion::parse("3.0.5").components(), [3, 0, 5, 0]);
        assert_eq!(BuildVersion::parse("").components(), [0, 0, 0, 0]);
        assert_eq!(BuildVersion::parse("no digits").components(), [0, 0, 0, 0]);
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        // Build "9" sorts below "10" within the same major.minor.
        assert_eq!(
            compare_builds("Nova-3.0.5-9", "Nova-3.0.5-10"),
            Ordering::Less
        );
        assert_eq!(
            compare_builds("Nova-3.0.5-86", "Nova-3.0.5-86"),
            Ordering::Equal
        );
        assert_eq!(compare_builds("Nova-10.0.0", "Nova-9.9.9"), Ordering::Greater);
    }

    #[test]
    fn test_evaluate_unreachable_ceiling_offered() {
        let registry = vec![pkg("doctor", "Nova-99.0.0", "")];
        let selected = evaluate("Nova-3.0.5-86", &registry);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "doctor");
    }

    #[test]
    fn test_evaluate_already_at_target() {
        let registry = vec![pkg("doctor", "Nova-3.0.5-86", "")];
        assert!(evaluate("Nova-3.0.5-86", &registry).is_empty());
        assert!(evaluate("Nova-3.0.5-90", &registry).is_empty());
    }

    #[test]
    fn test_evaluate_below_minimum() {
        let registry = vec![pkg("delta", "Nova-3.0.5-86", "Nova-3.0.5-60")];
        assert!(evaluate("Nova-3.0.5-50", &registry).is_empty());
        assert_eq!(evaluate("Nova-3.0.5-60", &registry).len(), 1);
        assert_eq!(evaluate("Nova-3.0.5-64", &registry).len(), 1);
    }

    #[test]
    fn test_evaluate_preserves_registry_order() {
        let registry = vec![
            pkg("first", "Nova-99.0.0", ""),
            pkg("second", "Nova-4.0.0", ""),
            pkg("ineligible", "Nova-1.0.0", ""),
            pkg("third", "Nova-98.0.0", ""),
        ];
        let names: Vec<&str> = evaluate("Nova-3.0.5-86", &registry)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_evaluate_empty_registry() {
        assert!(evaluate("Nova-3.0.5-86", &[]).is_empty());
    }
}
