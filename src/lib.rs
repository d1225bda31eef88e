//! Capstan - A package manager and build system for Fortran
//!
//! This crate provides the core library functionality for Capstan,
//! including source discovery and parsing, build-model assembly,
//! target-graph construction, and incremental build execution.

pub mod builder;
pub mod core;
pub mod ops;
pub mod sources;
pub mod util;

/// Test utilities and mocks for Capstan unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a mock command runner and project fixtures
/// so builds can be exercised without a real Fortran compiler.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    error::Error, manifest::Manifest, model::BuildModel, package::Package, target::Target,
};

pub use crate::builder::toolchain::Toolchain;
pub use crate::sources::parser::SourceFile;
