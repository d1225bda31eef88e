//! Build-graph construction and execution.
//!
//! `targets` expands a `BuildModel` into the typed target DAG, `schedule`
//! sorts it into parallel-safe regions against the digest cache, and
//! `executor` drives the external tools region by region.

pub mod compile_commands;
pub mod digest_cache;
pub mod executor;
pub mod progress;
pub mod schedule;
pub mod targets;
pub mod toolchain;
