//! Outcome of one compatibility check against one target release.

use serde::Serialize;

use crate::core::distro::{Distro, Release};
use crate::core::family::SymbolFamily;

/// A pass/fail verdict for a (check, target release) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    /// `<family>_abi_check_<distro>_<release>`
    pub id: String,

    pub distro: Distro,

    /// Release as targeted (`stable`, `jammy`)
    pub release: String,

    /// Codename the release resolved to, if any
    pub codename: Option<String>,

    pub family: SymbolFamily,

    /// Whether the bundle can run on the release
    #[serde(rename = "success")]
    pub passed: bool,

    /// Highest version the bundle requires
    pub required: String,

    /// Highest version the release provides; `None` if no data was found
    pub max_supported: Option<String>,

    pub message: String,
}

impl CheckResult {
    pub fn new(
        family: SymbolFamily,
        distro: Distro,
        release: &Release,
        required: String,
        max_supported: Option<String>,
        passed: bool,
    ) -> Self {
        CheckResult {
            id: format!("{}_{}_{}", family.check_id(), distro.id(), release.id),
            message: format!("AppImage can run on {} {}", distro, release.label()),
            distro,
            release: release.id.clone(),
            codename: release.codename.clone(),
            family,
            passed,
            required,
            max_supported,
        }
    }
}
