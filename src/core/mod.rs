//! Core data types.

pub mod bundle;
pub mod check;
pub mod distro;
pub mod family;
pub mod version;

pub use bundle::{Bundle, BundleKind};
pub use check::CheckResult;
pub use distro::{Distro, Release, DEBIAN_SUITES};
pub use family::{SymbolFamily, SymbolVersionSet};
pub use version::{max_version, Version, VersionParseError};
