//! Implementation of `capstan run` and `capstan test`.
//!
//! Builds the project, selects executables by scope and name, and runs
//! them with inherited stdio, forwarding arguments and propagating the
//! child's exit code.

use std::path::Path;

use anyhow::{bail, Result};

use crate::core::target::TargetKind;
use crate::ops::build::{build, Artifact, BuildOptions};
use crate::sources::parser::SourceScope;
use crate::util::process::ProcessBuilder;

/// Which group of executables to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunScope {
    /// `app/` executables
    App,
    /// `test/` executables
    Test,
    /// `example/` executables
    Example,
}

impl RunScope {
    fn source_scope(&self) -> SourceScope {
        match self {
            RunScope::App => SourceScope::App,
            RunScope::Test => SourceScope::Test,
            RunScope::Example => SourceScope::Example,
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            RunScope::App => "executable",
            RunScope::Test => "test",
            RunScope::Example => "example",
        }
    }
}

/// Options for run/test.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Build options
    pub build: BuildOptions,
    /// Executable name filter (empty selects everything in scope)
    pub names: Vec<String>,
    /// Arguments forwarded to the executable
    pub args: Vec<String>,
    /// List matching executables instead of running
    pub list: bool,
}

/// Build and run executables of `scope`; returns the exit code to
/// propagate.
pub fn run(manifest_dir: &Path, scope: RunScope, opts: &RunOptions) -> Result<i32> {
    let mut build_opts = opts.build.clone();
    if scope == RunScope::Test {
        build_opts.include_tests = true;
    }

    let output = build(manifest_dir, &build_opts)?;

    let selected: Vec<&Artifact> = output
        .artifacts
        .iter()
        .filter(|a| a.kind == TargetKind::Executable && a.scope == scope.source_scope())
        .filter(|a| opts.names.is_empty() || opts.names.iter().any(|n| *n == a.name))
        .collect();

    if opts.list {
        for artifact in &selected {
            println!("{} ({})", artifact.name, artifact.path.display());
        }
        return Ok(0);
    }

    if selected.is_empty() {
        if opts.names.is_empty() {
            bail!("no {}s found in this package", scope.noun());
        }
        bail!(
            "no {} matches `{}`",
            scope.noun(),
            opts.names.join("`, `")
        );
    }

    // Running several apps at once is almost always a mistake; tests and
    // examples run as a suite.
    if scope == RunScope::App && selected.len() > 1 && opts.names.is_empty() {
        let available: Vec<&str> = selected.iter().map(|a| a.name.as_str()).collect();
        bail!(
            "more than one executable found; pick one of: {}",
            available.join(", ")
        );
    }

    let mut exit_code = 0;
    for artifact in selected {
        tracing::debug!("running {}", artifact.path.display());
        let code = ProcessBuilder::new(&artifact.path)
            .args(&opts.args)
            .exec_inherited()?;
        if code != 0 {
            exit_code = code;
            if scope != RunScope::Test {
                break;
            }
        }
    }

    Ok(exit_code)
}
