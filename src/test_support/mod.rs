//! Test utilities for appimagelint unit tests.
//!
//! Provides an ELF fixture builder, in-memory reference data and reference
//! sources with scripted fetch results.

pub mod elf;
pub mod fixtures;

pub use fixtures::*;
