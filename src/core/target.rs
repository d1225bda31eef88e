//! Target definitions - nodes of the build DAG.
//!
//! Targets are stored in a flat vector owned by the builder for one build
//! invocation; edges and source back-references are stable integer
//! handles, never pointers.

use std::path::PathBuf;

/// Stable handle of a target within the build's target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub usize);

/// Stable handle of a source file: (package index, source index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceRef {
    /// Index into `BuildModel::packages`
    pub package: usize,
    /// Index into that package's `sources`
    pub source: usize,
}

/// The kind of artifact a target produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Object compiled from a Fortran source
    FortranObject,
    /// Object compiled from a C source
    CObject,
    /// Object compiled from a C++ source
    CppObject,
    /// Static library aggregating a package's library objects
    Archive,
    /// Linked executable
    Executable,
    /// Shared library
    SharedLib,
}

impl TargetKind {
    /// Whether this target compiles a single source file.
    pub fn is_object(&self) -> bool {
        matches!(
            self,
            TargetKind::FortranObject | TargetKind::CObject | TargetKind::CppObject
        )
    }

    /// Human-readable verb for progress output.
    pub fn verb(&self) -> &'static str {
        match self {
            TargetKind::FortranObject | TargetKind::CObject | TargetKind::CppObject => "compiling",
            TargetKind::Archive => "archiving",
            TargetKind::Executable | TargetKind::SharedLib => "linking",
        }
    }
}

/// How a dependency edge constrains the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// The dependency must be built before this target compiles
    /// (module files, include files).
    Compile,
    /// The dependency's output is an input to this target's link/archive
    /// step.
    Link,
}

/// A dependency edge.
#[derive(Debug, Clone, Copy)]
pub struct TargetDep {
    /// The depended-on target
    pub target: TargetId,
    /// Edge kind
    pub kind: EdgeKind,
}

/// A node in the build DAG.
#[derive(Debug, Clone)]
pub struct Target {
    /// Artifact kind
    pub kind: TargetKind,

    /// Owning package name
    pub package: String,

    /// Absolute output path
    pub output_file: PathBuf,

    /// Back-reference to the source that produced this target
    /// (object kinds only)
    pub source: Option<SourceRef>,

    /// Dependency edges
    pub dependencies: Vec<TargetDep>,

    /// Compile flag tokens (object kinds)
    pub compile_flags: Vec<String>,

    /// Link flag tokens (executable / shared-library kinds)
    pub link_flags: Vec<String>,

    /// Native libraries appended at link time
    pub link_libraries: Vec<String>,

    /// Digests of include files folded into this target's staleness check
    pub include_digests: Vec<u64>,

    /// Expected digest: source + dependency digests + flag string
    pub digest_expected: Option<u64>,

    /// Digest previously recorded next to the output, if any
    pub digest_cached: Option<u64>,

    /// Whether the target is up-to-date and can be skipped
    pub skip: bool,

    /// Parallel schedule region, assigned by the sorter
    pub schedule_region: usize,

    /// DFS mark: node fully visited
    pub sorted: bool,

    /// DFS mark: node on the current visit path (cycle detection)
    pub visiting: bool,
}

impl Target {
    /// Create a target with no edges or flags.
    pub fn new(kind: TargetKind, package: impl Into<String>, output_file: PathBuf) -> Self {
        Target {
            kind,
            package: package.into(),
            output_file,
            source: None,
            dependencies: Vec::new(),
            compile_flags: Vec::new(),
            link_flags: Vec::new(),
            link_libraries: Vec::new(),
            include_digests: Vec::new(),
            digest_expected: None,
            digest_cached: None,
            skip: false,
            schedule_region: 0,
            sorted: false,
            visiting: false,
        }
    }

    /// Add a dependency edge.
    pub fn depend(&mut self, target: TargetId, kind: EdgeKind) {
        if !self
            .dependencies
            .iter()
            .any(|d| d.target == target && d.kind == kind)
        {
            self.dependencies.push(TargetDep { target, kind });
        }
    }

    /// Iterate compile-edge dependencies.
    pub fn compile_deps(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.dependencies
            .iter()
            .filter(|d| d.kind == EdgeKind::Compile)
            .map(|d| d.target)
    }

    /// Iterate link-edge dependencies in declaration (link) order.
    pub fn link_deps(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.dependencies
            .iter()
            .filter(|d| d.kind == EdgeKind::Link)
            .map(|d| d.target)
    }

    /// The flag string hashed into the expected digest.
    pub fn flag_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.compile_flags.len() + self.link_flags.len());
        parts.extend(self.compile_flags.iter().cloned());
        parts.extend(self.link_flags.iter().cloned());
        parts.extend(self.link_libraries.iter().cloned());
        parts.join(" ")
    }

    /// Base name used in progress output (`<pkg>.<basename>`).
    pub fn display_name(&self) -> String {
        let base = self
            .output_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.output_file.display().to_string());
        format!("{}.{}", self.package, base)
    }
}

/// Platform-dependent output naming.
pub mod names {
    /// Executable file name for the current platform.
    pub fn executable(name: &str) -> String {
        if cfg!(windows) {
            format!("{}.exe", name)
        } else {
            name.to_string()
        }
    }

    /// Static archive file name for a package.
    pub fn archive(package: &str) -> String {
        if cfg!(windows) {
            format!("{}.lib", package)
        } else {
            format!("lib{}.a", package)
        }
    }

    /// Shared library file name for a package.
    pub fn shared_library(package: &str) -> String {
        if cfg!(windows) {
            format!("{}.dll", package)
        } else if cfg!(target_os = "macos") {
            format!("lib{}.dylib", package)
        } else {
            format!("lib{}.so", package)
        }
    }

    /// Import-library sibling emitted next to a shared library on Windows.
    pub fn import_library(package: &str) -> String {
        format!("{}.dll.lib", package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_depend_dedupes_edges() {
        let mut t = Target::new(
            TargetKind::Executable,
            "demo",
            Path::new("/b/app/demo/demo").to_path_buf(),
        );
        t.depend(TargetId(3), EdgeKind::Link);
        t.depend(TargetId(3), EdgeKind::Link);
        t.depend(TargetId(3), EdgeKind::Compile);
        assert_eq!(t.dependencies.len(), 2);
        assert_eq!(t.link_deps().count(), 1);
        assert_eq!(t.compile_deps().count(), 1);
    }

    #[test]
    fn test_display_name() {
        let t = Target::new(
            TargetKind::FortranObject,
            "demo",
            Path::new("/b/demo/src/m.f90.o").to_path_buf(),
        );
        assert_eq!(t.display_name(), "demo.m.f90.o");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_unix_names() {
        assert_eq!(names::executable("app"), "app");
        assert_eq!(names::archive("demo"), "libdemo.a");
    }
}
