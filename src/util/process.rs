//! Subprocess execution utilities.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command, capturing stdout and stderr.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;

        Ok(output)
    }

    /// Execute the command with inherited stdio, returning the exit code.
    ///
    /// Used for `capstan run`, where the child owns the terminal.
    pub fn exec_inherited(&self) -> Result<i32> {
        let mut cmd = self.build_command();
        let status = cmd
            .status()
            .with_context(|| format!("failed to execute `{}`", self.program.display()))?;
        Ok(status.code().unwrap_or(-1))
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Output captured from a finished subprocess.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    /// Process exit code (-1 when terminated by a signal)
    pub exit_code: i32,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CapturedOutput {
    /// Whether the process exited successfully.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Executes external tool invocations on behalf of the build executor.
///
/// Production builds use [`SystemRunner`]; tests substitute a mock that
/// materializes outputs without spawning real compilers.
pub trait CommandRunner: Send + Sync {
    /// Run a command, writing combined stdout+stderr to `log`.
    fn run_logged(&self, program: &Path, args: &[String], log: &Path) -> Result<i32>;

    /// Run a command, capturing output in memory. Used for version probes
    /// and flag-support checks.
    fn run_captured(&self, program: &Path, args: &[String]) -> Result<CapturedOutput>;
}

/// Runner that spawns real subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run_logged(&self, program: &Path, args: &[String], log: &Path) -> Result<i32> {
        let output = ProcessBuilder::new(program).args(args).exec()?;

        let mut contents = Vec::with_capacity(output.stdout.len() + output.stderr.len());
        contents.extend_from_slice(&output.stdout);
        contents.extend_from_slice(&output.stderr);
        fs::write(log, &contents)
            .with_context(|| format!("failed to write log file: {}", log.display()))?;

        Ok(output.status.code().unwrap_or(-1))
    }

    fn run_captured(&self, program: &Path, args: &[String]) -> Result<CapturedOutput> {
        let output = ProcessBuilder::new(program).args(args).exec()?;
        Ok(CapturedOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find a Fortran compiler, honoring the `FC` environment variable.
pub fn find_fortran_compiler() -> Option<PathBuf> {
    if let Ok(fc) = std::env::var("FC") {
        if let Some(path) = find_executable(&fc) {
            return Some(path);
        }
        // FC may be an absolute path not on PATH
        let path = PathBuf::from(&fc);
        if path.is_file() {
            return Some(path);
        }
    }

    for compiler in &["gfortran", "ifx", "ifort", "flang-new", "flang", "lfortran"] {
        if let Some(path) = find_executable(compiler) {
            return Some(path);
        }
    }

    None
}

/// Find a C compiler, honoring the `CC` environment variable.
pub fn find_c_compiler() -> Option<PathBuf> {
    if let Ok(cc) = std::env::var("CC") {
        if let Some(path) = find_executable(&cc) {
            return Some(path);
        }
    }

    for compiler in &["cc", "gcc", "clang", "icx"] {
        if let Some(path) = find_executable(compiler) {
            return Some(path);
        }
    }

    None
}

/// Find a C++ compiler, honoring the `CXX` environment variable.
pub fn find_cxx_compiler() -> Option<PathBuf> {
    if let Ok(cxx) = std::env::var("CXX") {
        if let Some(path) = find_executable(&cxx) {
            return Some(path);
        }
    }

    for compiler in &["c++", "g++", "clang++", "icpx"] {
        if let Some(path) = find_executable(compiler) {
            return Some(path);
        }
    }

    None
}

/// Find the ar archiver, honoring the `AR` environment variable.
pub fn find_archiver() -> Option<PathBuf> {
    if let Ok(ar) = std::env::var("AR") {
        if let Some(path) = find_executable(&ar) {
            return Some(path);
        }
    }

    for archiver in &["ar", "llvm-ar", "lib"] {
        if let Some(path) = find_executable(archiver) {
            return Some(path);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("gfortran").args(["-c", "-o", "m.o", "m.f90"]);
        assert_eq!(pb.display_command(), "gfortran -c -o m.o m.f90");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_logged() {
        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("out.log");

        let code = SystemRunner
            .run_logged(Path::new("echo"), &["hello".to_string()], &log)
            .unwrap();

        assert_eq!(code, 0);
        let contents = fs::read_to_string(&log).unwrap();
        assert!(contents.contains("hello"));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captured() {
        let out = SystemRunner
            .run_captured(Path::new("echo"), &["probe".to_string()])
            .unwrap();
        assert!(out.success());
        assert!(out.stdout.contains("probe"));
    }
}
