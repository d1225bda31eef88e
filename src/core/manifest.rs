//! Capstan.toml parsing and validation.
//!
//! The manifest declares the package, its library and executable layout,
//! path dependencies, Fortran language features, and preprocessor settings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::core::error::Error;

/// The manifest file name.
pub const MANIFEST_FILE: &str = "Capstan.toml";

/// A parsed `Capstan.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Manifest {
    /// The `[package]` table
    pub package: PackageSection,

    /// The `[library]` table
    #[serde(default)]
    pub library: Option<LibrarySection>,

    /// `[[executable]]` entries
    #[serde(default)]
    pub executable: Vec<ExecutableSection>,

    /// `[[test]]` entries
    #[serde(default)]
    pub test: Vec<ExecutableSection>,

    /// `[[example]]` entries
    #[serde(default)]
    pub example: Vec<ExecutableSection>,

    /// `[dependencies]` table (path dependencies)
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,

    /// `[dev-dependencies]` table, used only for the root package's tests
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, DependencySpec>,

    /// `[fortran]` language feature table
    #[serde(default)]
    pub fortran: FortranSection,

    /// `[build]` table
    #[serde(default)]
    pub build: BuildSection,

    /// `[preprocess]` table, keyed by preprocessor name (e.g. "cpp")
    #[serde(default)]
    pub preprocess: BTreeMap<String, PreprocessSection>,
}

/// The `[package]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PackageSection {
    /// Package name
    pub name: String,

    /// Package version, up to three numeric components
    pub version: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Optional license expression
    #[serde(default)]
    pub license: Option<String>,
}

/// The `[library]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LibrarySection {
    /// Library source directory
    #[serde(default = "default_lib_dir")]
    pub source_dir: PathBuf,

    /// Directories with include files exported to dependents
    #[serde(default)]
    pub include_dir: Vec<PathBuf>,

    /// Library kind: static (default) or shared
    #[serde(default)]
    pub kind: LibraryKind,
}

impl Default for LibrarySection {
    fn default() -> Self {
        LibrarySection {
            source_dir: default_lib_dir(),
            include_dir: Vec::new(),
            kind: LibraryKind::Static,
        }
    }
}

fn default_lib_dir() -> PathBuf {
    PathBuf::from("src")
}

/// How the package library is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    /// Static archive
    #[default]
    Static,
    /// Shared library (with an import-library sibling on Windows)
    Shared,
}

/// An `[[executable]]`, `[[test]]`, or `[[example]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ExecutableSection {
    /// Executable name
    pub name: String,

    /// Directory holding the executable's sources
    #[serde(default)]
    pub source_dir: Option<PathBuf>,

    /// Main program file within the source directory
    #[serde(default = "default_main")]
    pub main: String,

    /// Native libraries to link against
    #[serde(default)]
    pub link: Vec<String>,
}

fn default_main() -> String {
    "main.f90".to_string()
}

/// A single dependency declaration.
///
/// Only path dependencies are resolvable here; git and registry sources
/// are rejected at validation time.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DependencySpec {
    /// Relative path to the dependency's package root
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Git URL (unsupported; rejected with a manifest error)
    #[serde(default)]
    pub git: Option<String>,
}

/// The `[fortran]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FortranSection {
    /// Whether implicit typing is permitted
    #[serde(default)]
    pub implicit_typing: bool,

    /// Whether implicit external interfaces are permitted
    #[serde(default)]
    pub implicit_external: bool,

    /// Source form: free, fixed, or default (by file extension)
    #[serde(default)]
    pub source_form: SourceForm,
}

impl Default for FortranSection {
    fn default() -> Self {
        FortranSection {
            implicit_typing: false,
            implicit_external: false,
            source_form: SourceForm::Free,
        }
    }
}

/// Fortran source form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceForm {
    /// Free-form source
    #[default]
    Free,
    /// Fixed-form source
    Fixed,
    /// Decide per file extension
    Default,
}

/// The `[build]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BuildSection {
    /// Discover programs under app/ automatically
    #[serde(default = "default_true")]
    pub auto_executables: bool,

    /// Discover programs under test/ automatically
    #[serde(default = "default_true")]
    pub auto_tests: bool,

    /// Discover programs under example/ automatically
    #[serde(default = "default_true")]
    pub auto_examples: bool,

    /// Native libraries every target of this package links against
    #[serde(default)]
    pub link: Vec<String>,

    /// Modules assumed provided outside the build (never resolved to targets)
    #[serde(default)]
    pub external_modules: Vec<String>,

    /// Module naming enforcement: `true` (package-name prefix),
    /// `false` (off), or an explicit prefix string
    #[serde(default)]
    pub module_naming: ModuleNaming,
}

impl Default for BuildSection {
    fn default() -> Self {
        BuildSection {
            auto_executables: true,
            auto_tests: true,
            auto_examples: true,
            link: Vec::new(),
            external_modules: Vec::new(),
            module_naming: ModuleNaming::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Module naming policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ModuleNaming {
    /// `module-naming = true|false`
    Enforce(bool),
    /// `module-naming = "prefix"`
    Prefix(String),
}

impl Default for ModuleNaming {
    fn default() -> Self {
        ModuleNaming::Enforce(false)
    }
}

/// A `[preprocess.<name>]` table.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PreprocessSection {
    /// Macro definitions, `NAME` or `NAME=VALUE`
    #[serde(default)]
    pub macros: Vec<String>,

    /// Include directories searched for `include`/`#include` files
    #[serde(default)]
    pub directories: Vec<PathBuf>,

    /// Additional source suffixes routed through this preprocessor
    #[serde(default)]
    pub suffixes: Vec<String>,
}

impl Manifest {
    /// Load and validate a manifest from a `Capstan.toml` file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let manifest: Manifest = toml::from_str(&text).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        manifest.validate(path)?;
        Ok(manifest)
    }

    /// Parse the package version, padding missing components with zeros.
    pub fn version(&self) -> Result<Version, Error> {
        parse_version(&self.package.version).ok_or_else(|| Error::Manifest {
            path: PathBuf::from(MANIFEST_FILE),
            message: format!("invalid version `{}`", self.package.version),
        })
    }

    /// Whether this manifest declares (or defaults to) a library.
    pub fn has_library(&self, root: &Path) -> bool {
        match &self.library {
            Some(lib) => root.join(&lib.source_dir).is_dir(),
            None => root.join("src").is_dir(),
        }
    }

    /// Effective library section (declared or defaulted).
    pub fn library_section(&self) -> LibrarySection {
        self.library.clone().unwrap_or_default()
    }

    fn validate(&self, path: &Path) -> Result<(), Error> {
        if self.package.name.is_empty() {
            return Err(Error::Manifest {
                path: path.to_path_buf(),
                message: "package name must not be empty".into(),
            });
        }

        if !self
            .package
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::Manifest {
                path: path.to_path_buf(),
                message: format!(
                    "package name `{}` contains invalid characters",
                    self.package.name
                ),
            });
        }

        if parse_version(&self.package.version).is_none() {
            return Err(Error::Manifest {
                path: path.to_path_buf(),
                message: format!("invalid version `{}`", self.package.version),
            });
        }

        for (name, spec) in self.dependencies.iter().chain(&self.dev_dependencies) {
            if spec.git.is_some() {
                return Err(Error::Manifest {
                    path: path.to_path_buf(),
                    message: format!(
                        "dependency `{}` uses a git source; only path dependencies are supported",
                        name
                    ),
                });
            }
            if spec.path.is_none() {
                return Err(Error::Manifest {
                    path: path.to_path_buf(),
                    message: format!("dependency `{}` is missing a `path`", name),
                });
            }
        }

        for exe in self
            .executable
            .iter()
            .chain(&self.test)
            .chain(&self.example)
        {
            if exe.name.is_empty() {
                return Err(Error::Manifest {
                    path: path.to_path_buf(),
                    message: "executable entries require a non-empty name".into(),
                });
            }
        }

        Ok(())
    }
}

/// Parse a version with up to three numeric components.
fn parse_version(s: &str) -> Option<Version> {
    let mut parts = s.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    let patch = parts.next().map_or(Some(0), |p| p.parse().ok())?;
    if parts.next().is_some() {
        return None;
    }
    Some(Version::new(major, minor, patch))
}
