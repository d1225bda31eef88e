//! Build error taxonomy.
//!
//! Fatal conditions (missing files, parse errors, graph cycles, unresolved
//! modules) abort the build immediately. Per-target tool failures are
//! non-fatal: they stop scheduling after the failing region and are
//! reported together at the end.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal build errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced file does not exist.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// A source file could not be parsed.
    #[error("{}:{line}:{column}: {message}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// The package manifest is invalid.
    #[error("invalid manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    /// A cycle in the module, target, or package graph.
    #[error("dependency cycle detected: {}", names.join(" -> "))]
    Cycle { names: Vec<String> },

    /// A used module has no provider in the model and is not external.
    #[error("module `{module}` used by {} is not provided by any source", consumer.display())]
    MissingModule { module: String, consumer: PathBuf },

    /// Underlying I/O failure outside the per-target path.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What stage of a target's build failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Compile,
    Archive,
    Link,
    /// Digest or log bookkeeping failed after the tool succeeded.
    Io,
}

impl FailureStage {
    /// Human-readable stage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Compile => "compilation",
            FailureStage::Archive => "archiving",
            FailureStage::Link => "linking",
            FailureStage::Io => "i/o",
        }
    }
}

/// A non-fatal failure of a single target.
///
/// Collected by the executor; the build stops scheduling new regions after
/// the region containing the failure, and all failures are reported
/// together.
#[derive(Debug)]
pub struct TargetFailure {
    /// The output the target was supposed to produce.
    pub output_file: PathBuf,
    /// Which stage failed.
    pub stage: FailureStage,
    /// Tool exit code (0 for bookkeeping failures).
    pub exit_code: i32,
    /// Log file holding the tool's captured output, when one was written.
    pub log_file: Option<PathBuf>,
}

impl std::fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} failed for {} (exit code {})",
            self.stage.as_str(),
            self.output_file.display(),
            self.exit_code
        )
    }
}
