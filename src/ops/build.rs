//! Implementation of `capstan build`.
//!
//! Loads the package graph, detects the toolchain, constructs the build
//! model and target DAG, and drives the incremental executor. Returns
//! the produced artifacts; tool failures are reported with their logs
//! and surface as a build error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::builder::executor::{execute, BuildReport, BuildSession};
use crate::builder::progress::detect_console_mode;
use crate::builder::schedule::sort_targets;
use crate::builder::targets::build_target_graph;
use crate::builder::toolchain::{toolchain_for, Profile, SystemArchiver};
use crate::core::model::BuildModel;
use crate::core::target::TargetKind;
use crate::sources::assemble::load_packages;
use crate::sources::parser::SourceScope;
use crate::util::process::{find_fortran_compiler, SystemRunner};

/// Options for the build command.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Build profile
    pub profile: Profile,

    /// Parallel jobs (default: available parallelism)
    pub jobs: Option<usize>,

    /// Record commands without executing them
    pub dry_run: bool,

    /// Build test executables too
    pub include_tests: bool,

    /// Replace the profile's default Fortran flags
    pub flags: Option<String>,

    /// Plain, immediate output
    pub verbose: bool,

    /// No progress output
    pub quiet: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            profile: Profile::Debug,
            jobs: None,
            dry_run: false,
            include_tests: false,
            flags: None,
            verbose: false,
            quiet: false,
        }
    }
}

/// A produced build artifact.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Absolute output path
    pub path: PathBuf,
    /// Owning package
    pub package: String,
    /// Artifact base name
    pub name: String,
    /// Target kind
    pub kind: TargetKind,
    /// Scope for executables (app/test/example)
    pub scope: SourceScope,
}

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildOutput {
    /// All artifacts present in the build tree (built or fresh)
    pub artifacts: Vec<Artifact>,
    /// Executor report
    pub report: BuildReport,
    /// The build prefix used
    pub build_prefix: PathBuf,
}

/// Construct the build model for a project directory.
pub fn assemble_model(manifest_dir: &Path, opts: &BuildOptions) -> Result<BuildModel> {
    let packages = load_packages(manifest_dir)?;

    let runner = Arc::new(SystemRunner);
    let fc = find_fortran_compiler()
        .context("no Fortran compiler found; install one or set the FC environment variable")?;
    let toolchain = toolchain_for(fc, runner.as_ref());
    let archiver = Arc::new(SystemArchiver::detect()?);

    let fortran_flags = match &opts.flags {
        Some(flags) => flags.split_whitespace().map(String::from).collect(),
        None => match std::env::var("FFLAGS") {
            Ok(flags) => flags.split_whitespace().map(String::from).collect(),
            Err(_) => toolchain.default_flags(opts.profile),
        },
    };

    let external_modules = packages
        .iter()
        .flat_map(|p| p.external_modules.iter().cloned())
        .collect();
    let include_dirs = packages
        .iter()
        .flat_map(|p| p.include_dirs.iter().cloned())
        .collect();

    Ok(BuildModel {
        root_package_name: packages[0].name.clone(),
        packages,
        toolchain,
        archiver,
        runner,
        fortran_flags,
        c_flags: Vec::new(),
        cxx_flags: Vec::new(),
        link_flags: Vec::new(),
        build_prefix: manifest_dir
            .join("build")
            .join(opts.profile.as_str()),
        include_dirs,
        link_libraries: Vec::new(),
        external_modules,
        include_tests: opts.include_tests,
    })
}

/// Build the project rooted at `manifest_dir`.
pub fn build(manifest_dir: &Path, opts: &BuildOptions) -> Result<BuildOutput> {
    let model = assemble_model(manifest_dir, opts)?;
    build_model(&model, opts)
}

/// Build from an already-assembled model.
pub fn build_model(model: &BuildModel, opts: &BuildOptions) -> Result<BuildOutput> {
    let mut targets = build_target_graph(model)?;
    let schedule = sort_targets(model, &mut targets)?;

    tracing::info!(
        "{} target(s) scheduled, {} up to date",
        schedule.len(),
        schedule.skipped
    );

    let session = BuildSession::new(
        detect_console_mode(opts.verbose, opts.quiet),
        schedule.len(),
        opts.jobs.unwrap_or_else(BuildSession::default_jobs),
        opts.dry_run,
    );

    let report = execute(model, &targets, &schedule, &session)?;

    session
        .commands
        .write(&model.build_prefix.join("compile_commands.json"))?;

    if !report.success() {
        for failure in &report.failures {
            eprintln!("error: {}", failure);
            if let Some(log) = &failure.log_file {
                if let Ok(contents) = std::fs::read_to_string(log) {
                    eprint!("{}", contents);
                }
            }
        }
        bail!("build failed: {} target(s) failed", report.failures.len());
    }

    let artifacts = collect_artifacts(model, &targets);
    Ok(BuildOutput {
        artifacts,
        report,
        build_prefix: model.build_prefix.clone(),
    })
}

fn collect_artifacts(model: &BuildModel, targets: &[crate::core::target::Target]) -> Vec<Artifact> {
    targets
        .iter()
        .filter(|t| {
            matches!(
                t.kind,
                TargetKind::Executable | TargetKind::Archive | TargetKind::SharedLib
            )
        })
        .map(|t| Artifact {
            path: t.output_file.clone(),
            package: t.package.clone(),
            name: t
                .output_file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            kind: t.kind,
            scope: artifact_scope(model, t),
        })
        .collect()
}

/// Scope of an executable artifact, read off its build-tree location.
fn artifact_scope(model: &BuildModel, target: &crate::core::target::Target) -> SourceScope {
    if target.kind != TargetKind::Executable {
        return SourceScope::Lib;
    }

    let rel = target
        .output_file
        .strip_prefix(&model.build_prefix)
        .unwrap_or(&target.output_file);
    match rel.components().next() {
        Some(c) if c.as_os_str() == "app" => SourceScope::App,
        Some(c) if c.as_os_str() == "test" => SourceScope::Test,
        Some(c) if c.as_os_str() == "example" => SourceScope::Example,
        _ => SourceScope::Unknown,
    }
}
