//! Package assembly: manifests plus scanned sources become `Package`
//! records ready for target-graph construction.
//!
//! The root package is loaded first, then path dependencies in
//! first-encounter depth-first order. Per-file parsing fans out across a
//! rayon pool; parsing has no cross-file ordering.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::core::error::Error;
use crate::core::manifest::{DependencySpec, ExecutableSection, Manifest, MANIFEST_FILE};
use crate::core::package::Package;
use crate::sources::parser::{parse_source, SourceFile, SourceScope, UnitKind};
use crate::sources::scanner::{scan_sources, ScanFilter};
use crate::util::fs::normalize_path;

/// Load the root package at `root_dir` and all its path dependencies.
///
/// Returns packages root-first, dependencies in resolution order.
pub fn load_packages(root_dir: &Path) -> Result<Vec<Package>, Error> {
    let mut packages = Vec::new();
    let mut seen_roots: BTreeSet<PathBuf> = BTreeSet::new();
    let mut loading: Vec<(PathBuf, String)> = Vec::new();

    load_one(
        &normalize_path(root_dir),
        true,
        &mut packages,
        &mut seen_roots,
        &mut loading,
    )?;

    warn_duplicate_modules(&packages);
    Ok(packages)
}

fn load_one(
    dir: &Path,
    is_root: bool,
    packages: &mut Vec<Package>,
    seen_roots: &mut BTreeSet<PathBuf>,
    loading: &mut Vec<(PathBuf, String)>,
) -> Result<(), Error> {
    // A dependency pointing back into a package still being loaded is a
    // manifest-graph cycle. Packages that finished loading dedup instead
    // (diamond dependencies are fine).
    if let Some(pos) = loading.iter().position(|(root, _)| root == dir) {
        let mut names: Vec<String> = loading[pos..].iter().map(|(_, n)| n.clone()).collect();
        names.push(loading[pos].1.clone());
        return Err(Error::Cycle { names });
    }

    if !seen_roots.insert(dir.to_path_buf()) {
        return Ok(());
    }

    let manifest_path = dir.join(MANIFEST_FILE);
    let manifest = Manifest::load(&manifest_path)?;
    let version = manifest.version()?;

    if let Some(existing) = packages
        .iter()
        .find(|p| p.name == manifest.package.name)
    {
        return Err(Error::Manifest {
            path: manifest_path,
            message: format!(
                "package name `{}` is already provided by {}",
                existing.name,
                existing.root.display()
            ),
        });
    }

    let mut package = Package::from_manifest(&manifest, dir.to_path_buf(), version);
    assemble_sources(&mut package, &manifest, !is_root)?;
    validate_module_names(&package)?;

    tracing::debug!(
        "loaded package `{}` v{} with {} source(s)",
        package.name,
        package.version,
        package.sources.len()
    );

    let package_name = package.name.clone();
    packages.push(package);
    loading.push((dir.to_path_buf(), package_name));

    let mut dep_specs: Vec<(&String, &DependencySpec)> = manifest.dependencies.iter().collect();
    if is_root {
        dep_specs.extend(manifest.dev_dependencies.iter());
    }

    for (name, spec) in dep_specs {
        let rel = spec.path.as_ref().expect("validated path dependency");
        let dep_root = normalize_path(&dir.join(rel));
        if !dep_root.is_dir() {
            return Err(Error::Manifest {
                path: dir.join(MANIFEST_FILE),
                message: format!(
                    "dependency `{}` path {} does not exist",
                    name,
                    dep_root.display()
                ),
            });
        }
        load_one(&dep_root, false, packages, seen_roots, loading)?;
    }

    loading.pop();
    Ok(())
}

/// Scan and parse every source of one package, assigning scopes.
fn assemble_sources(
    package: &mut Package,
    manifest: &Manifest,
    is_dependency: bool,
) -> Result<(), Error> {
    let filter = ScanFilter::with_suffixes(&package.preprocess.suffixes);
    let mut seen: BTreeSet<PathBuf> = BTreeSet::new();
    let mut pending: Vec<(PathBuf, SourceScope)> = Vec::new();

    // Library sources
    let lib = manifest.library_section();
    let lib_dir = package.root.join(&lib.source_dir);
    for path in scan_sources(&lib_dir, true, &filter, &mut seen) {
        pending.push((path, SourceScope::Lib));
    }

    // Explicit executable entries: the main file carries the declared
    // name and link libraries.
    let mut explicit: Vec<(PathBuf, SourceScope, String, Vec<String>)> = Vec::new();
    let sections: [(&[ExecutableSection], SourceScope, &str); 3] = [
        (manifest.executable.as_slice(), SourceScope::App, "app"),
        (manifest.test.as_slice(), SourceScope::Test, "test"),
        (manifest.example.as_slice(), SourceScope::Example, "example"),
    ];

    for (entries, scope, default_dir) in sections {
        let scope = if is_dependency { SourceScope::Dep } else { scope };
        for entry in entries {
            let dir = entry
                .source_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(default_dir));
            let main = package.root.join(&dir).join(&entry.main);
            if !main.is_file() {
                return Err(Error::FileNotFound { path: main });
            }

            let canonical = normalize_path(&main);
            if seen.insert(canonical.clone()) {
                explicit.push((canonical, scope, entry.name.clone(), entry.link.clone()));
            }

            // Support sources living beside the main file
            for path in scan_sources(&package.root.join(&dir), true, &filter, &mut seen) {
                pending.push((path, scope));
            }
        }
    }

    // Auto-discovered program directories (root package only)
    if !is_dependency {
        let auto: [(bool, SourceScope, &str); 3] = [
            (manifest.build.auto_executables, SourceScope::App, "app"),
            (manifest.build.auto_tests, SourceScope::Test, "test"),
            (manifest.build.auto_examples, SourceScope::Example, "example"),
        ];
        for (enabled, scope, dir) in auto {
            if !enabled {
                continue;
            }
            for path in scan_sources(&package.root.join(dir), true, &filter, &mut seen) {
                pending.push((path, scope));
            }
        }
    }

    // Parse in parallel; per-file parsing is independent.
    let mut parsed: Vec<SourceFile> = pending
        .par_iter()
        .map(|(path, scope)| {
            parse_source(path).map(|mut source| {
                source.scope = *scope;
                source
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let explicit_parsed: Vec<SourceFile> = explicit
        .par_iter()
        .map(|(path, scope, name, link)| {
            parse_source(path).map(|mut source| {
                source.scope = *scope;
                source.exe_name = Some(name.clone());
                source.link_libraries = link.clone();
                if !matches!(
                    source.unit_kind,
                    UnitKind::CSource | UnitKind::CppSource | UnitKind::CHeader
                ) {
                    source.unit_kind = UnitKind::Program;
                }
                source
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    parsed.extend(explicit_parsed);
    parsed.sort_by(|a, b| a.path.cmp(&b.path));
    package.sources = parsed;
    Ok(())
}

/// Enforce the module-name prefix when the package opts in.
fn validate_module_names(package: &Package) -> Result<(), Error> {
    if !package.enforce_module_names {
        return Ok(());
    }

    let prefix = package.effective_module_prefix();
    for source in &package.sources {
        for module in &source.provided_modules {
            if module == &prefix || module.starts_with(&prefix) {
                continue;
            }
            return Err(Error::Manifest {
                path: package.root.join(MANIFEST_FILE),
                message: format!(
                    "module `{}` in {} does not start with the enforced prefix `{}`",
                    module,
                    source.path.display(),
                    prefix
                ),
            });
        }
    }
    Ok(())
}

/// Warn about module names provided by more than one package.
fn warn_duplicate_modules(packages: &[Package]) {
    let mut providers: BTreeMap<&str, (&str, &Path)> = BTreeMap::new();
    for package in packages {
        for source in &package.sources {
            for module in &source.provided_modules {
                match providers.get(module.as_str()) {
                    Some((other_pkg, other_path)) if *other_pkg != package.name => {
                        tracing::warn!(
                            "module `{}` is provided by both `{}` ({}) and `{}` ({})",
                            module,
                            other_pkg,
                            other_path.display(),
                            package.name,
                            source.path.display()
                        );
                    }
                    Some(_) => {}
                    None => {
                        providers.insert(module, (&package.name, &source.path));
                    }
                }
            }
        }
    }
}
