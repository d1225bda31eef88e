//! Build model - the closed world handed to the target builder.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::builder::toolchain::{Archiver, Toolchain};
use crate::core::package::Package;
use crate::core::target::SourceRef;
use crate::sources::parser::SourceFile;
use crate::util::process::CommandRunner;

/// Everything the target builder and executor need for one build
/// invocation: the resolved packages (root first), the toolchain, global
/// flags, and output layout.
#[derive(Clone)]
pub struct BuildModel {
    /// Name of the root package
    pub root_package_name: String,

    /// Packages: root first, then dependencies in resolution order
    pub packages: Vec<Package>,

    /// Compiler abstraction chosen at model construction
    pub toolchain: Arc<dyn Toolchain>,

    /// Archiver abstraction
    pub archiver: Arc<dyn Archiver>,

    /// Subprocess runner used by the executor
    pub runner: Arc<dyn CommandRunner>,

    /// Global Fortran compile flags
    pub fortran_flags: Vec<String>,

    /// Global C compile flags
    pub c_flags: Vec<String>,

    /// Global C++ compile flags
    pub cxx_flags: Vec<String>,

    /// Global link flags
    pub link_flags: Vec<String>,

    /// Root directory for all build outputs
    pub build_prefix: PathBuf,

    /// Extra include directories searched for include files
    pub include_dirs: Vec<PathBuf>,

    /// Native libraries linked into every executable
    pub link_libraries: Vec<String>,

    /// Modules assumed provided outside the model
    pub external_modules: BTreeSet<String>,

    /// Whether test-scope sources are built
    pub include_tests: bool,
}

impl fmt::Debug for BuildModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildModel")
            .field("root_package_name", &self.root_package_name)
            .field("packages", &self.packages.len())
            .field("toolchain", &self.toolchain.vendor())
            .field("fortran_flags", &self.fortran_flags)
            .field("build_prefix", &self.build_prefix)
            .field("external_modules", &self.external_modules)
            .field("include_tests", &self.include_tests)
            .finish()
    }
}

impl BuildModel {
    /// Look up a source file by handle.
    pub fn source(&self, sref: SourceRef) -> &SourceFile {
        &self.packages[sref.package].sources[sref.source]
    }

    /// Find a package index by name.
    pub fn package_index(&self, name: &str) -> Option<usize> {
        self.packages.iter().position(|p| p.name == name)
    }

    /// The build directory of one package (objects, module files, archive).
    pub fn package_build_dir(&self, package: &str) -> PathBuf {
        self.build_prefix.join(package)
    }
}
