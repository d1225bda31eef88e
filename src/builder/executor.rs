//! Build execution.
//!
//! Walks the schedule region by region. Within a region targets run on a
//! rayon pool; across regions there is a strict happens-before. The first
//! failing region finishes its in-flight work, then no further regions
//! are scheduled. Tool output is captured per target into a sidecar
//! `.log` file; successful targets get their digest recorded and compile
//! invocations land in the command table.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::builder::compile_commands::CommandTable;
use crate::builder::digest_cache;
use crate::builder::progress::{BuildProgress, ConsoleMode};
use crate::builder::schedule::Schedule;
use crate::builder::toolchain::CommandSpec;
use crate::core::error::{FailureStage, TargetFailure};
use crate::core::model::BuildModel;
use crate::core::target::{Target, TargetId, TargetKind};
use crate::util::fs::ensure_dir;

/// Session-wide executor state: progress console, command table, worker
/// count, dry-run flag.
pub struct BuildSession {
    /// Progress reporter
    pub progress: BuildProgress,
    /// compile_commands.json accumulator
    pub commands: CommandTable,
    /// Parallel workers per region
    pub jobs: usize,
    /// Record commands without running them
    pub dry_run: bool,
}

impl BuildSession {
    /// Create a session for `total` scheduled targets.
    pub fn new(mode: ConsoleMode, total: usize, jobs: usize, dry_run: bool) -> Self {
        BuildSession {
            progress: BuildProgress::new(mode, total),
            commands: CommandTable::new(),
            jobs: jobs.max(1),
            dry_run,
        }
    }

    /// Default worker count: available parallelism, or 1 without it.
    pub fn default_jobs() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Outcome of one executor run.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Targets that executed successfully
    pub executed: usize,
    /// Targets skipped as up to date
    pub skipped: usize,
    /// Per-target failures, in completion order
    pub failures: Vec<TargetFailure>,
}

impl BuildReport {
    /// Whether the build succeeded.
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Execute the schedule against the model's toolchain.
pub fn execute(
    model: &BuildModel,
    targets: &[Target],
    schedule: &Schedule,
    session: &BuildSession,
) -> Result<BuildReport> {
    let mut report = BuildReport {
        skipped: schedule.skipped,
        ..BuildReport::default()
    };

    if schedule.is_empty() {
        return Ok(report);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(session.jobs)
        .build()
        .context("failed to start build worker pool")?;

    let executed = AtomicUsize::new(0);

    for region in schedule.regions() {
        let failures: Vec<TargetFailure> = pool.install(|| {
            region
                .par_iter()
                .filter_map(|id| {
                    match run_target(model, targets, *id, session) {
                        Ok(()) => {
                            executed.fetch_add(1, Ordering::SeqCst);
                            None
                        }
                        Err(failure) => Some(failure),
                    }
                })
                .collect()
        });

        if !failures.is_empty() {
            report.failures.extend(failures);
            break;
        }
    }

    report.executed = executed.load(Ordering::SeqCst);
    Ok(report)
}

fn failure_stage(kind: TargetKind) -> FailureStage {
    match kind {
        TargetKind::FortranObject | TargetKind::CObject | TargetKind::CppObject => {
            FailureStage::Compile
        }
        TargetKind::Archive => FailureStage::Archive,
        TargetKind::Executable | TargetKind::SharedLib => FailureStage::Link,
    }
}

/// Build one target: assemble the command, run it with the log captured,
/// record digest and compile command on success.
fn run_target(
    model: &BuildModel,
    targets: &[Target],
    id: TargetId,
    session: &BuildSession,
) -> Result<(), TargetFailure> {
    let target = &targets[id.0];
    let output = &target.output_file;
    let stage = failure_stage(target.kind);

    let io_failure = |_: anyhow::Error| TargetFailure {
        output_file: output.clone(),
        stage: FailureStage::Io,
        exit_code: 0,
        log_file: None,
    };

    if let Some(parent) = output.parent() {
        ensure_dir(parent).map_err(io_failure)?;
    }

    let spec = assemble_command(model, targets, target).map_err(io_failure)?;

    let token = session
        .progress
        .target_started(target.kind.verb(), &target.display_name());

    if session.dry_run {
        if target.kind.is_object() {
            register_compile(model, target, &spec, session);
        }
        session
            .progress
            .target_finished(token, &target.display_name(), true);
        return Ok(());
    }

    let log = digest_cache::log_path(output);
    tracing::debug!("running: {} {}", spec.program.display(), spec.args.join(" "));

    let exit_code = match model.runner.run_logged(&spec.program, &spec.args, &log) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("failed to launch tool for {}: {:#}", output.display(), err);
            session
                .progress
                .target_finished(token, &target.display_name(), false);
            return Err(TargetFailure {
                output_file: output.clone(),
                stage,
                exit_code: -1,
                log_file: None,
            });
        }
    };

    if exit_code != 0 {
        session
            .progress
            .target_finished(token, &target.display_name(), false);
        return Err(TargetFailure {
            output_file: output.clone(),
            stage,
            exit_code,
            log_file: Some(log),
        });
    }

    if let Some(digest) = target.digest_expected {
        if let Err(err) = digest_cache::write(output, digest) {
            tracing::error!("{:#}", err);
            session
                .progress
                .target_finished(token, &target.display_name(), false);
            return Err(TargetFailure {
                output_file: output.clone(),
                stage: FailureStage::Io,
                exit_code: 0,
                log_file: Some(log),
            });
        }
    }

    if target.kind.is_object() {
        register_compile(model, target, &spec, session);
    }

    session
        .progress
        .target_finished(token, &target.display_name(), true);
    Ok(())
}

fn register_compile(
    model: &BuildModel,
    target: &Target,
    spec: &CommandSpec,
    session: &BuildSession,
) {
    let Some(sref) = target.source else {
        return;
    };
    let source = model.source(sref);
    session
        .commands
        .register(&model.build_prefix, &source.path, spec.tokens());
}

/// Assemble the tool invocation for a target.
fn assemble_command(
    model: &BuildModel,
    targets: &[Target],
    target: &Target,
) -> Result<CommandSpec> {
    let toolchain = model.toolchain.as_ref();
    let out = &target.output_file;

    match target.kind {
        TargetKind::FortranObject | TargetKind::CObject | TargetKind::CppObject => {
            let source = target
                .source
                .map(|s| model.source(s).path.clone())
                .context("object target without a source")?;
            Ok(match target.kind {
                TargetKind::CObject => toolchain.compile_c_command(&source, out, &target.compile_flags),
                TargetKind::CppObject => {
                    toolchain.compile_cpp_command(&source, out, &target.compile_flags)
                }
                _ => toolchain.compile_fortran_command(&source, out, &target.compile_flags),
            })
        }

        TargetKind::Archive => {
            let objects: Vec<PathBuf> = target
                .link_deps()
                .map(|d| targets[d.0].output_file.clone())
                .collect();

            let response_file = if model.archiver.use_response_file() {
                let mut rsp_name = out.as_os_str().to_os_string();
                rsp_name.push(".rsp");
                let rsp = PathBuf::from(rsp_name);
                let list: String = objects
                    .iter()
                    .map(|o| format!("{}\n", o.display()))
                    .collect();
                std::fs::write(&rsp, list)
                    .with_context(|| format!("failed to write response file {}", rsp.display()))?;
                Some(rsp)
            } else {
                None
            };

            Ok(model
                .archiver
                .archive_command(&objects, out, response_file.as_deref()))
        }

        TargetKind::Executable | TargetKind::SharedLib => {
            let mut inputs: Vec<PathBuf> = target
                .compile_deps()
                .map(|d| targets[d.0].output_file.clone())
                .collect();
            inputs.extend(target.link_deps().map(|d| targets[d.0].output_file.clone()));

            let mut flags = target.link_flags.clone();
            flags.extend(target.link_libraries.iter().map(|l| format!("-l{}", l)));

            Ok(if target.kind == TargetKind::SharedLib {
                toolchain.link_shared_command(&inputs, out, &flags)
            } else {
                toolchain.link_executable_command(&inputs, out, &flags)
            })
        }
    }
}
