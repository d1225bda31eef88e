//! Test utilities and mocks for Capstan unit tests.
//!
//! Provides a mock command runner that materializes tool outputs without
//! spawning real compilers, plus fixture helpers that stand up small
//! Fortran projects on disk and wrap them in a `BuildModel`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::builder::executor::{execute, BuildReport, BuildSession};
use crate::builder::progress::ConsoleMode;
use crate::builder::schedule::{sort_targets, Schedule};
use crate::builder::targets::build_target_graph;
use crate::builder::toolchain::{GnuToolchain, SystemArchiver};
use crate::core::manifest::MANIFEST_FILE;
use crate::core::model::BuildModel;
use crate::core::target::Target;
use crate::sources::assemble::load_packages;
use crate::util::process::{CapturedOutput, CommandRunner};

/// Write a source file under `root`, creating parent directories.
pub fn write_source(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

/// Overwrite a source file with new content (a "touch" that matters,
/// since staleness tracks content digests, not mtimes).
pub fn touch_source(root: &Path, rel: &str, text: &str) {
    write_source(root, rel, text);
}

/// Command runner that records invocations and fabricates outputs.
#[derive(Debug, Default)]
pub struct MockRunner {
    commands: Mutex<Vec<Vec<String>>>,
    fail_patterns: Mutex<Vec<String>>,
}

impl MockRunner {
    /// Create a runner that succeeds on everything.
    pub fn new() -> Self {
        MockRunner::default()
    }

    /// Make commands whose line contains `pattern` exit nonzero.
    pub fn fail_matching(&self, pattern: &str) {
        self.fail_patterns.lock().unwrap().push(pattern.to_string());
    }

    /// Number of commands run so far.
    pub fn command_count(&self) -> usize {
        self.commands.lock().unwrap().len()
    }

    /// Forget recorded commands (between incremental builds in a test).
    pub fn clear(&self) {
        self.commands.lock().unwrap().clear();
    }

    /// The output files of all recorded commands.
    pub fn output_files(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter_map(|tokens| find_output(tokens))
            .collect()
    }

    fn record(&self, program: &Path, args: &[String]) -> Vec<String> {
        let mut tokens = vec![program.display().to_string()];
        tokens.extend(args.iter().cloned());
        self.commands.lock().unwrap().push(tokens.clone());
        tokens
    }

    fn should_fail(&self, tokens: &[String]) -> bool {
        let line = tokens.join(" ");
        self.fail_patterns
            .lock()
            .unwrap()
            .iter()
            .any(|p| line.contains(p.as_str()))
    }
}

/// Extract the output path from a recorded command: the token after
/// `-o`, or the archive name after `rcs`.
fn find_output(tokens: &[String]) -> Option<String> {
    if let Some(pos) = tokens.iter().position(|t| t == "-o") {
        return tokens.get(pos + 1).cloned();
    }
    if let Some(pos) = tokens.iter().position(|t| t == "rcs") {
        return tokens.get(pos + 1).cloned();
    }
    None
}

impl CommandRunner for MockRunner {
    fn run_logged(&self, program: &Path, args: &[String], log: &Path) -> Result<i32> {
        let tokens = self.record(program, args);

        if self.should_fail(&tokens) {
            std::fs::write(log, "mock failure\n")?;
            return Ok(1);
        }

        if let Some(output) = find_output(&tokens) {
            let path = PathBuf::from(output);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            // Output content tracks the command line, so relinking with
            // different inputs produces different bytes.
            std::fs::write(&path, tokens.join(" "))?;
        }

        std::fs::write(log, "")?;
        Ok(0)
    }

    fn run_captured(&self, program: &Path, args: &[String]) -> Result<CapturedOutput> {
        self.record(program, args);
        Ok(CapturedOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

fn default_manifest(name: &str) -> String {
    format!("[package]\nname = \"{}\"\nversion = \"0.1.0\"\n", name)
}

fn ensure_manifest(root: &Path, contents: &str) {
    let path = root.join(MANIFEST_FILE);
    if !path.exists() {
        std::fs::create_dir_all(root).unwrap();
        std::fs::write(path, contents).unwrap();
    }
}

fn model_for(root: &Path) -> (BuildModel, Arc<MockRunner>) {
    let packages = load_packages(root).expect("fixture packages load");
    let runner = Arc::new(MockRunner::new());

    let model = BuildModel {
        root_package_name: packages[0].name.clone(),
        packages,
        toolchain: Arc::new(GnuToolchain {
            fc: PathBuf::from("gfortran"),
            cc: PathBuf::from("gcc"),
            cxx: PathBuf::from("g++"),
        }),
        archiver: Arc::new(SystemArchiver {
            ar: PathBuf::from("ar"),
        }),
        runner: runner.clone(),
        fortran_flags: Vec::new(),
        c_flags: Vec::new(),
        cxx_flags: Vec::new(),
        link_flags: Vec::new(),
        build_prefix: root.join("build").join("debug"),
        include_dirs: Vec::new(),
        link_libraries: Vec::new(),
        external_modules: Default::default(),
        include_tests: true,
    };

    (model, runner)
}

/// Stand up a single-package fixture at `root` and wrap it in a model
/// driven by a mock runner.
pub fn fixture_model(root: &Path, name: &str) -> (BuildModel, Arc<MockRunner>) {
    ensure_manifest(root, &default_manifest(name));
    model_for(root)
}

/// Fixture with one path dependency.
pub fn fixture_model_with_dep(
    root: &Path,
    name: &str,
    dep_root: &Path,
    dep_name: &str,
) -> (BuildModel, Arc<MockRunner>) {
    let rel = pathdiff::diff_paths(dep_root, root).expect("relative dependency path");
    ensure_manifest(
        root,
        &format!(
            "[package]\nname = \"{}\"\nversion = \"0.1.0\"\n\n[dependencies]\n{} = {{ path = \"{}\" }}\n",
            name,
            dep_name,
            rel.display()
        ),
    );
    ensure_manifest(dep_root, &default_manifest(dep_name));
    model_for(root)
}

/// Run one full build pass: graph, sort, execute with a quiet session.
pub fn build_once(model: &BuildModel) -> (Vec<Target>, Schedule, BuildReport) {
    let mut targets = build_target_graph(model).expect("target graph");
    let schedule = sort_targets(model, &mut targets).expect("topological sort");
    let session = BuildSession::new(ConsoleMode::Quiet, schedule.len(), 2, false);
    let report = execute(model, &targets, &schedule, &session).expect("executor");
    (targets, schedule, report)
}
