//! Server-side management tree.
//!
//! A sparse map of addressable values keyed by dot-path URI. It holds the
//! server's constants plus whatever the device reports; it is only queried
//! and mutated through Get/Replace handling.

use std::collections::BTreeMap;

/// Value format of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeKind {
    /// Character data.
    #[default]
    Chr,
    /// Integer.
    Int,
    /// Boolean.
    Bool,
    /// Interior node.
    Node,
}

/// One addressable management value.
#[derive(Debug, Clone)]
pub struct DmNode {
    /// Dot-path URI (`./DevInfo/Mod`).
    pub uri: String,
    /// Current value.
    pub value: String,
    /// Value format.
    pub kind: NodeKind,
}

/// Sparse management tree.
#[derive(Debug, Clone, Default)]
pub struct DmTree {
    nodes: BTreeMap<String, DmNode>,
}

/// Device identity paths the server queries at session start.
pub const DEVINFO_PATHS: &[&str] = &[
    "./DevInfo/DevId",
    "./DevInfo/Man",
    "./DevInfo/Mod",
    "./DevInfo/FwV",
    "./DevInfo/SwV",
    "./DevInfo/HwV",
];

/// Software paths the server queries at session start.
pub const SOFTWARE_PATHS: &[&str] = &["./Software/Build"];

/// Package metadata paths written when an update is offered.
pub const PKG_NAME_URI: &str = "./Software/Package/PkgName";
/// Package version path.
pub const PKG_VERSION_URI: &str = "./Software/Package/PkgVersion";
/// Package download URL path.
pub const PKG_URL_URI: &str = "./Software/Package/PkgURL";
/// Package size path.
pub const PKG_SIZE_URI: &str = "./Software/Package/PkgSize";
/// Package checksum path.
pub const PKG_CHECKSUM_URI: &str = "./Software/Package/PkgMD5";
/// Package description path.
pub const PKG_DESC_URI: &str = "./Software/Package/PkgDesc";
/// Executable node that starts download and installation on the device.
pub const DOWNLOAD_AND_INSTALL_URI: &str = "./Software/Operations/DownloadAndInstall";

impl DmTree {
    /// Empty tree seeded with the standard interior nodes.
    pub fn new() -> Self {
        let mut tree = Self::default();
        for uri in DEVINFO_PATHS.iter().chain(SOFTWARE_PATHS) {
            tree.nodes.insert(
                normalize(uri),
                DmNode {
                    uri: (*uri).to_string(),
                    value: String::new(),
                    kind: NodeKind::Chr,
                },
            );
        }
        tree
    }

    /// Value at a URI, if the node exists.
    pub fn get(&self, uri: &str) -> Option<&str> {
        self.nodes.get(&normalize(uri)).map(|n| n.value.as_str())
    }

    /// Set a value, creating the node when absent.
    pub fn replace(&mut self, uri: &str, value: impl Into<String>) {
        let key = normalize(uri);
        let value = value.into();
        match self.nodes.get_mut(&key) {
            Some(node) => node.value = value,
            None => {
                self.nodes.insert(
                    key,
                    DmNode {
                        uri: uri.to_string(),
                        value,
                        kind: NodeKind::Chr,
                    },
                );
            }
        }
    }

    /// Whether a node exists at the URI.
    pub fn exists(&self, uri: &str) -> bool {
        self.nodes.contains_key(&normalize(uri))
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Canonical key form: leading `./`, `.`, and `/` prefixes removed.
fn normalize(uri: &str) -> String {
    let uri = uri.trim();
    let uri = uri.strip_prefix("./").unwrap_or(uri);
    let uri = uri.strip_prefix('.').unwrap_or(uri);
    uri.strip_prefix('/').unwrap_or(uri).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_paths_exist() {
        let tree = DmTree::new();
        assert!(tree.exists("./DevInfo/DevId"));
        assert!(tree.exists("./Software/Build"));
        assert!(!tree.exists("./Software/Package/PkgName"));
    }

    #[test]
    fn test_replace_and_get() {
        let mut tree = DmTree::new();
        tree.replace("./Software/Build", "Nova-3.0.5-64");
        assert_eq!(tree.get("./Software/Build"), Some("Nova-3.0.5-64"));

        // Prefix variants address the same node.
        assert_eq!(tree.get("Software/Build"), Some("Nova-3.0.5-64"));
        assert_eq!(tree.get("/Software/Build"), Some("Nova-3.0.5-64"));
    }

    #[test]
    fn test_replace_creates_missing_node() {
        let mut tree = DmTree::new();
        assert!(!tree.exists(PKG_URL_URI));
        tree.replace(PKG_URL_URI, "https://updates.example.net/packages/fix.ipk");
        assert_eq!(
            tree.get(PKG_URL_URI),
            Some("https://updates.example.net/packages/fix.ipk")
        );
    }
}
