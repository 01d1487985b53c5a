//! appimagelint - checks AppImages for compatibility with Linux distributions
//!
//! This crate provides the library behind the `appimagelint` binary: reading
//! the symbol versions ELF binaries require, caching the versions
//! distribution releases provide, and deciding which releases a bundle can
//! run on.

pub mod cache;
pub mod core;
pub mod elf;
pub mod ops;
pub mod sources;
pub mod util;

/// Test fixtures for appimagelint unit tests.
///
/// Only available in test builds. Provides an ELF file builder and
/// in-memory reference data.
#[cfg(test)]
pub mod test_support;

pub use cache::{CacheError, CompatibilityCache};
pub use core::{
    bundle::Bundle, check::CheckResult, distro::Distro, family::SymbolFamily, version::Version,
};
pub use ops::{CompatibilityEngine, FamilyResults};
pub use util::context::GlobalContext;
