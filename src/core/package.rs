//! Package - a resolvable unit combining manifest settings with parsed sources.

use std::path::PathBuf;

use semver::Version;

use crate::core::manifest::{LibraryKind, Manifest, ModuleNaming, SourceForm};
use crate::sources::parser::SourceFile;

/// Language feature settings applied to every Fortran source of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageFeatures {
    /// Whether implicit typing is permitted
    pub implicit_typing: bool,
    /// Whether implicit external interfaces are permitted
    pub implicit_external: bool,
    /// Source form selection
    pub source_form: SourceForm,
}

impl Default for PackageFeatures {
    fn default() -> Self {
        PackageFeatures {
            implicit_typing: false,
            implicit_external: false,
            source_form: SourceForm::Free,
        }
    }
}

/// Preprocessor configuration for a package.
#[derive(Debug, Clone, Default)]
pub struct PreprocessConfig {
    /// Macro definitions, `NAME` or `NAME=VALUE`
    pub macros: Vec<String>,
    /// Include directories for `include`/`#include` resolution
    pub include_dirs: Vec<PathBuf>,
    /// Enabled preprocessor names (e.g. "cpp")
    pub processors: Vec<String>,
    /// Extra source suffixes routed through a preprocessor
    pub suffixes: Vec<String>,
}

/// A resolved package: the root package or one of its path dependencies.
#[derive(Debug, Clone)]
pub struct Package {
    /// Package name
    pub name: String,

    /// Package version
    pub version: Version,

    /// Package root directory (holds `Capstan.toml`)
    pub root: PathBuf,

    /// All parsed sources of this package
    pub sources: Vec<SourceFile>,

    /// Language feature settings
    pub features: PackageFeatures,

    /// Preprocessor configuration
    pub preprocess: PreprocessConfig,

    /// Whether provided module names must carry the package prefix
    pub enforce_module_names: bool,

    /// Module prefix when enforcement is on (defaults to the package name)
    pub module_prefix: Option<String>,

    /// Whether the package library is built as a shared library
    pub shared_library: bool,

    /// Native libraries every target of this package links against
    pub link_libraries: Vec<String>,

    /// Modules this package assumes are provided outside the build
    pub external_modules: Vec<String>,

    /// Include directories exported to dependents
    pub include_dirs: Vec<PathBuf>,

    /// Names of this package's direct dependencies, declaration order
    pub dependencies: Vec<String>,

    /// Dev-dependency names; linked only into test executables
    pub dev_dependencies: Vec<String>,
}

impl Package {
    /// Create a package shell from its manifest; sources are attached by
    /// the assembler.
    pub fn from_manifest(manifest: &Manifest, root: PathBuf, version: Version) -> Self {
        let (enforce, prefix) = match &manifest.build.module_naming {
            ModuleNaming::Enforce(on) => (*on, None),
            ModuleNaming::Prefix(p) => (true, Some(p.to_lowercase())),
        };

        let mut preprocess = PreprocessConfig::default();
        for (name, section) in &manifest.preprocess {
            preprocess.processors.push(name.clone());
            preprocess.macros.extend(section.macros.iter().cloned());
            preprocess
                .include_dirs
                .extend(section.directories.iter().map(|d| root.join(d)));
            preprocess.suffixes.extend(section.suffixes.iter().cloned());
        }

        let shared_library = manifest
            .library
            .as_ref()
            .map(|lib| lib.kind == LibraryKind::Shared)
            .unwrap_or(false);

        let include_dirs = manifest
            .library_section()
            .include_dir
            .iter()
            .map(|d| root.join(d))
            .collect();

        Package {
            name: manifest.package.name.clone(),
            version,
            root,
            sources: Vec::new(),
            features: PackageFeatures {
                implicit_typing: manifest.fortran.implicit_typing,
                implicit_external: manifest.fortran.implicit_external,
                source_form: manifest.fortran.source_form,
            },
            preprocess,
            enforce_module_names: enforce,
            module_prefix: prefix,
            shared_library,
            link_libraries: manifest.build.link.clone(),
            external_modules: manifest
                .build
                .external_modules
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            include_dirs,
            dependencies: manifest.dependencies.keys().cloned().collect(),
            dev_dependencies: manifest.dev_dependencies.keys().cloned().collect(),
        }
    }

    /// The module prefix used when `enforce_module_names` is set.
    ///
    /// Defaults to the package name with non-identifier characters folded
    /// to underscores.
    pub fn effective_module_prefix(&self) -> String {
        match &self.module_prefix {
            Some(prefix) => prefix.clone(),
            None => self
                .name
                .to_lowercase()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(text: &str) -> Manifest {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn test_from_manifest_defaults() {
        let m = manifest(
            r#"
            [package]
            name = "fftpack"
            version = "1.0.0"
            "#,
        );

        let pkg = Package::from_manifest(&m, PathBuf::from("/p"), Version::new(1, 0, 0));
        assert_eq!(pkg.name, "fftpack");
        assert!(!pkg.enforce_module_names);
        assert!(!pkg.shared_library);
        assert!(pkg.dependencies.is_empty());
    }

    #[test]
    fn test_module_prefix_from_name() {
        let m = manifest(
            r#"
            [package]
            name = "My-Solver"
            version = "0.2"

            [build]
            module-naming = true
            "#,
        );

        let pkg = Package::from_manifest(&m, PathBuf::from("/p"), Version::new(0, 2, 0));
        assert!(pkg.enforce_module_names);
        assert_eq!(pkg.effective_module_prefix(), "my_solver");
    }

    #[test]
    fn test_preprocess_flattening() {
        let m = manifest(
            r#"
            [package]
            name = "demo"
            version = "0.1.0"

            [preprocess.cpp]
            macros = ["NDEBUG"]
            directories = ["include"]
            "#,
        );

        let pkg = Package::from_manifest(&m, PathBuf::from("/p"), Version::new(0, 1, 0));
        assert_eq!(pkg.preprocess.processors, vec!["cpp"]);
        assert_eq!(pkg.preprocess.macros, vec!["NDEBUG"]);
        assert_eq!(pkg.preprocess.include_dirs, vec![PathBuf::from("/p/include")]);
    }
}
