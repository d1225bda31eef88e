//! High-level operations backing the CLI subcommands.

pub mod build;
pub mod clean;
pub mod new;
pub mod run;
