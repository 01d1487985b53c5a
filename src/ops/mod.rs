//! High-level operations.
//!
//! This module contains the implementation of appimagelint commands.

pub mod check;
pub mod maintenance;
pub mod mount;
pub mod report;

pub use check::{decide, CheckError, CompatibilityEngine, Decision, FamilyResults};
pub use maintenance::{update_all, UpdateOutcome};
pub use mount::{AppImageMounter, Mount, MountError};
pub use report::JsonReport;
