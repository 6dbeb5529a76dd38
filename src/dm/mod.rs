//! Device-management domain: the server-side management tree, the package
//! registry, and the update eligibility rules.

mod registry;
mod tree;
mod update;

pub use registry::PackageRegistry;
pub use tree::{
    DmNode, DmTree, NodeKind, DEVINFO_PATHS, DOWNLOAD_AND_INSTALL_URI, PKG_CHECKSUM_URI,
    PKG_DESC_URI, PKG_NAME_URI, PKG_SIZE_URI, PKG_URL_URI, PKG_VERSION_URI, SOFTWARE_PATHS,
};
pub use update::{compare_builds, evaluate, BuildVersion, PackageDescriptor};
