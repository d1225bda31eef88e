//! Target-graph construction.
//!
//! Expands a `BuildModel` into the typed target DAG: one object target
//! per compiled source, an archive (or shared library) per package, and
//! an executable per program unit, with compile/link edges, composed
//! flags, and link ordering.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use crate::core::error::Error;
use crate::core::model::BuildModel;
use crate::core::target::{names, EdgeKind, SourceRef, Target, TargetId, TargetKind};
use crate::builder::toolchain::FortranFeature;
use crate::sources::parser::{SourceScope, UnitKind};
use crate::util::digest::digest_source;
use crate::util::fs::{normalize_path, relative_path};

/// Build the target DAG for a model.
pub fn build_target_graph(model: &BuildModel) -> Result<Vec<Target>, Error> {
    let mut builder = GraphBuilder::new(model);
    builder.add_object_targets()?;
    builder.resolve_compile_edges()?;
    builder.add_library_targets();
    builder.add_executable_targets()?;
    Ok(builder.targets)
}

struct GraphBuilder<'a> {
    model: &'a BuildModel,
    targets: Vec<Target>,
    /// (package, source) -> object target
    object_ids: HashMap<SourceRef, TargetId>,
    /// module name -> providers in model package order
    providers: BTreeMap<String, Vec<SourceRef>>,
    /// canonical source path -> source handle
    by_path: HashMap<PathBuf, SourceRef>,
    /// package index -> its library target (archive or shared lib)
    lib_targets: Vec<Option<TargetId>>,
}

impl<'a> GraphBuilder<'a> {
    fn new(model: &'a BuildModel) -> Self {
        let mut providers: BTreeMap<String, Vec<SourceRef>> = BTreeMap::new();
        let mut by_path = HashMap::new();

        for (pi, package) in model.packages.iter().enumerate() {
            for (si, source) in package.sources.iter().enumerate() {
                let sref = SourceRef {
                    package: pi,
                    source: si,
                };
                by_path.insert(source.path.clone(), sref);
                for module in &source.provided_modules {
                    providers.entry(module.clone()).or_default().push(sref);
                }
            }
        }

        GraphBuilder {
            model,
            targets: Vec::new(),
            object_ids: HashMap::new(),
            providers,
            by_path,
            lib_targets: vec![None; model.packages.len()],
        }
    }

    fn push(&mut self, target: Target) -> TargetId {
        let id = TargetId(self.targets.len());
        self.targets.push(target);
        id
    }

    /// Whether a source participates in the build.
    fn is_built(&self, sref: SourceRef) -> bool {
        let source = self.model.source(sref);
        if !source.is_compiled() {
            return false;
        }
        match source.scope {
            SourceScope::Dep | SourceScope::Unknown => false,
            SourceScope::Test => self.model.include_tests,
            _ => true,
        }
    }

    /// One object target per compiled source.
    fn add_object_targets(&mut self) -> Result<(), Error> {
        for pi in 0..self.model.packages.len() {
            for si in 0..self.model.packages[pi].sources.len() {
                let sref = SourceRef {
                    package: pi,
                    source: si,
                };
                if !self.is_built(sref) {
                    continue;
                }

                let package = &self.model.packages[pi];
                let source = &package.sources[si];

                let kind = match source.unit_kind {
                    UnitKind::CSource => TargetKind::CObject,
                    UnitKind::CppSource => TargetKind::CppObject,
                    _ => TargetKind::FortranObject,
                };

                let rel = relative_path(&package.root, &source.path);
                let mut file_name = rel.as_os_str().to_os_string();
                file_name.push(".o");
                let output_file = self
                    .model
                    .package_build_dir(&package.name)
                    .join(PathBuf::from(file_name));

                let mut target = Target::new(kind, package.name.clone(), output_file);
                target.source = Some(sref);
                target.compile_flags = self.compose_compile_flags(pi, kind);

                let id = self.push(target);
                self.object_ids.insert(sref, id);
            }
        }
        Ok(())
    }

    /// Deterministic flag composition: global language flags, package
    /// feature flags, macro definitions, include flags, module output.
    fn compose_compile_flags(&self, pi: usize, kind: TargetKind) -> Vec<String> {
        let model = self.model;
        let package = &model.packages[pi];
        let toolchain = model.toolchain.as_ref();
        let mut flags = Vec::new();

        match kind {
            TargetKind::CObject => flags.extend(model.c_flags.iter().cloned()),
            TargetKind::CppObject => flags.extend(model.cxx_flags.iter().cloned()),
            _ => {
                flags.extend(model.fortran_flags.iter().cloned());
                for feature in FortranFeature::for_features(
                    package.features.implicit_typing,
                    package.features.implicit_external,
                    package.features.source_form,
                ) {
                    flags.extend(toolchain.feature_flag(feature));
                }
            }
        }

        for m in &package.preprocess.macros {
            flags.push(format!("-D{}", m));
        }

        for dir in package
            .preprocess
            .include_dirs
            .iter()
            .chain(&model.include_dirs)
        {
            flags.extend(toolchain.include_flag(dir));
        }

        if kind == TargetKind::FortranObject {
            // Module files of every package in the model are visible.
            for other in &model.packages {
                flags.extend(toolchain.include_flag(&model.package_build_dir(&other.name)));
            }
            flags.extend(toolchain.module_output_flag(&model.package_build_dir(&package.name)));
        }

        flags
    }

    /// Resolve used modules, submodule parents, and include files into
    /// compile edges (and folded include digests).
    fn resolve_compile_edges(&mut self) -> Result<(), Error> {
        let ids: Vec<(SourceRef, TargetId)> = self
            .object_ids
            .iter()
            .map(|(s, t)| (*s, *t))
            .collect();

        for (sref, id) in ids {
            let source = self.model.source(sref);

            let mut wanted: Vec<&String> = source.used_modules.iter().collect();
            wanted.extend(source.parent_modules.iter());

            for module in wanted {
                if self.model.external_modules.contains(module) {
                    continue;
                }
                if source.provided_modules.contains(module)
                    && source.parent_modules.iter().all(|p| p != module)
                {
                    // Defined in the same file; no self-edge.
                    continue;
                }

                let provider = self.find_provider(module, sref).ok_or_else(|| {
                    Error::MissingModule {
                        module: module.clone(),
                        consumer: source.path.clone(),
                    }
                })?;

                if provider != id {
                    self.targets[id.0].depend(provider, EdgeKind::Compile);
                }
            }

            // Include files: edge when the file compiles, folded digest
            // otherwise.
            let includes = source.include_deps.clone();
            let src_dir = source
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            for name in includes {
                match self.resolve_include(&name, &src_dir, sref.package) {
                    Some(path) => {
                        if let Some(dep_id) =
                            self.by_path.get(&path).and_then(|r| self.object_ids.get(r))
                        {
                            let dep_id = *dep_id;
                            if dep_id != id {
                                self.targets[id.0].depend(dep_id, EdgeKind::Compile);
                            }
                        } else if let Some(sref) = self.by_path.get(&path) {
                            let digest = self.model.source(*sref).digest;
                            self.targets[id.0].include_digests.push(digest);
                        } else {
                            match std::fs::read_to_string(&path) {
                                Ok(text) => self.targets[id.0]
                                    .include_digests
                                    .push(digest_source(&text)),
                                Err(err) => tracing::warn!(
                                    "could not read include file {}: {}",
                                    path.display(),
                                    err
                                ),
                            }
                        }
                    }
                    None => tracing::warn!(
                        "include file `{}` used by {} not found in include directories",
                        name,
                        source.path.display()
                    ),
                }
            }
        }
        Ok(())
    }

    /// Find the object target providing a module: same package first, then
    /// the other packages in model order.
    fn find_provider(&self, module: &str, consumer: SourceRef) -> Option<TargetId> {
        let candidates = self.providers.get(module)?;

        let same_package = candidates
            .iter()
            .find(|r| r.package == consumer.package && self.object_ids.contains_key(r));
        let any = candidates.iter().find(|r| self.object_ids.contains_key(r));

        same_package
            .or(any)
            .and_then(|r| self.object_ids.get(r))
            .copied()
    }

    /// Locate an include file: next to the includer, then package include
    /// directories, then model include directories.
    fn resolve_include(&self, name: &str, src_dir: &Path, pi: usize) -> Option<PathBuf> {
        let package = &self.model.packages[pi];
        let candidates = std::iter::once(src_dir.to_path_buf())
            .chain(package.preprocess.include_dirs.iter().cloned())
            .chain(self.model.include_dirs.iter().cloned());

        for dir in candidates {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(normalize_path(&candidate));
            }
        }
        None
    }

    /// One archive (or shared library) per package with library objects.
    fn add_library_targets(&mut self) {
        for pi in 0..self.model.packages.len() {
            let package = &self.model.packages[pi];

            let mut objects: Vec<TargetId> = Vec::new();
            for (si, source) in package.sources.iter().enumerate() {
                if source.scope != SourceScope::Lib {
                    continue;
                }
                let sref = SourceRef {
                    package: pi,
                    source: si,
                };
                if let Some(id) = self.object_ids.get(&sref) {
                    objects.push(*id);
                }
            }

            if objects.is_empty() {
                continue;
            }

            let build_dir = self.model.package_build_dir(&package.name);
            let mut target = if package.shared_library {
                let mut t = Target::new(
                    TargetKind::SharedLib,
                    package.name.clone(),
                    build_dir.join(names::shared_library(&package.name)),
                );
                t.link_flags = self.model.link_flags.clone();
                if cfg!(windows) {
                    let implib = build_dir.join(names::import_library(&package.name));
                    t.link_flags
                        .push(format!("-Wl,--out-implib,{}", implib.display()));
                }
                t
            } else {
                Target::new(
                    TargetKind::Archive,
                    package.name.clone(),
                    build_dir.join(names::archive(&package.name)),
                )
            };

            for id in objects {
                target.depend(id, EdgeKind::Link);
            }

            let id = self.push(target);
            self.lib_targets[pi] = Some(id);
        }
    }

    /// One executable per program unit in an active scope.
    fn add_executable_targets(&mut self) -> Result<(), Error> {
        let entries: Vec<(SourceRef, TargetId)> = {
            let mut v: Vec<_> = self
                .object_ids
                .iter()
                .map(|(s, t)| (*s, *t))
                .collect();
            v.sort_by_key(|(_, t)| *t);
            v
        };

        for (sref, object_id) in entries {
            let source = self.model.source(sref);
            if !source.is_executable_unit() {
                continue;
            }

            let scope_dir = match source.scope {
                SourceScope::App => "app",
                SourceScope::Test => "test",
                SourceScope::Example => "example",
                _ => continue,
            };

            let package = &self.model.packages[sref.package];
            let exe_name = source
                .exe_name
                .clone()
                .unwrap_or_else(|| {
                    source
                        .path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "main".to_string())
                });

            let output_file = self
                .model
                .build_prefix
                .join(scope_dir)
                .join(&package.name)
                .join(names::executable(&exe_name));

            let mut target =
                Target::new(TargetKind::Executable, package.name.clone(), output_file);
            target.depend(object_id, EdgeKind::Compile);

            // Helper objects from the same scope, reachable through
            // compile edges; they are not part of any archive.
            for helper in self.scope_closure(object_id) {
                target.depend(helper, EdgeKind::Link);
            }

            // Archives in link order: this package first, dependencies by
            // reverse post-order of the package graph.
            let include_dev =
                source.scope == SourceScope::Test && sref.package == 0;
            let order = self.flatten_link_order(sref.package, include_dev)?;
            for pi in order {
                if let Some(lib) = self.lib_targets[pi] {
                    target.depend(lib, EdgeKind::Link);
                }
            }

            // Native libraries: source entry, then package, then model.
            for lib in source
                .link_libraries
                .iter()
                .chain(&package.link_libraries)
                .chain(&self.model.link_libraries)
            {
                if !target.link_libraries.contains(lib) {
                    target.link_libraries.push(lib.clone());
                }
            }

            target.link_flags = self.model.link_flags.clone();
            if matches!(
                self.targets[object_id.0].kind,
                TargetKind::CObject | TargetKind::CppObject
            ) {
                target
                    .link_flags
                    .extend(self.model.toolchain.feature_flag(FortranFeature::NoFortranMain));
            }

            self.push(target);
        }
        Ok(())
    }

    /// Non-library object targets reachable from `start` over compile
    /// edges (executable support sources outside the archive).
    fn scope_closure(&self, start: TargetId) -> Vec<TargetId> {
        let mut found = Vec::new();
        let mut queue = VecDeque::from([start]);
        let mut visited = vec![false; self.targets.len()];
        visited[start.0] = true;

        while let Some(id) = queue.pop_front() {
            for dep in self.targets[id.0].compile_deps() {
                if visited[dep.0] {
                    continue;
                }
                visited[dep.0] = true;

                let target = &self.targets[dep.0];
                if !target.kind.is_object() {
                    continue;
                }
                let in_archive = target
                    .source
                    .map(|s| self.model.source(s).scope == SourceScope::Lib)
                    .unwrap_or(false);
                if !in_archive {
                    found.push(dep);
                }
                queue.push_back(dep);
            }
        }

        found.sort();
        found
    }

    /// Flatten the package dependency closure by reverse post-order DFS.
    ///
    /// The returned sequence is the link order: the root package first,
    /// dependencies after their dependents. Cycles in the package graph
    /// are fatal.
    fn flatten_link_order(&self, root: usize, include_dev: bool) -> Result<Vec<usize>, Error> {
        let mut visited = vec![false; self.model.packages.len()];
        let mut visiting = vec![false; self.model.packages.len()];
        let mut post = Vec::new();
        let mut stack = Vec::new();

        self.visit_package(root, include_dev, &mut visited, &mut visiting, &mut post, &mut stack)?;

        post.reverse();
        Ok(post)
    }

    #[allow(clippy::too_many_arguments)]
    fn visit_package(
        &self,
        pi: usize,
        include_dev: bool,
        visited: &mut Vec<bool>,
        visiting: &mut Vec<bool>,
        post: &mut Vec<usize>,
        stack: &mut Vec<String>,
    ) -> Result<(), Error> {
        let package = &self.model.packages[pi];

        if visiting[pi] {
            let mut names: Vec<String> = stack.clone();
            names.push(package.name.clone());
            return Err(Error::Cycle { names });
        }
        if visited[pi] {
            return Ok(());
        }

        visiting[pi] = true;
        stack.push(package.name.clone());

        let mut deps: Vec<&String> = package.dependencies.iter().collect();
        if include_dev {
            deps.extend(package.dev_dependencies.iter());
        }

        for dep_name in deps {
            let di = self
                .model
                .package_index(dep_name)
                .ok_or_else(|| Error::Manifest {
                    path: package.root.join("Capstan.toml"),
                    message: format!("dependency `{}` was not resolved", dep_name),
                })?;
            self.visit_package(di, false, visited, visiting, post, stack)?;
        }

        stack.pop();
        visiting[pi] = false;
        visited[pi] = true;
        post.push(pi);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture_model, write_source};
    use tempfile::TempDir;

    fn target_by_suffix<'t>(targets: &'t [Target], suffix: &str) -> &'t Target {
        targets
            .iter()
            .find(|t| t.output_file.to_string_lossy().ends_with(suffix))
            .unwrap_or_else(|| panic!("no target ending in {}", suffix))
    }

    #[test]
    fn test_single_module_graph() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/m.f90", "module m\nend module\n");

        let (model, _runner) = fixture_model(tmp.path(), "demo");
        let targets = build_target_graph(&model).unwrap();

        // One object plus the package archive.
        assert_eq!(targets.len(), 2);
        let object = target_by_suffix(&targets, "m.f90.o");
        assert_eq!(object.kind, TargetKind::FortranObject);

        let archive = target_by_suffix(&targets, "libdemo.a");
        assert_eq!(archive.kind, TargetKind::Archive);
        assert_eq!(archive.link_deps().count(), 1);
    }

    #[test]
    fn test_module_chain_edges() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/a.f90", "module a\nend module\n");
        write_source(tmp.path(), "src/b.f90", "module b\nuse a\nend module\n");
        write_source(
            tmp.path(),
            "app/main.f90",
            "program main\nuse b\nend program\n",
        );

        let (model, _runner) = fixture_model(tmp.path(), "demo");
        let targets = build_target_graph(&model).unwrap();

        let a = targets
            .iter()
            .position(|t| t.output_file.to_string_lossy().ends_with("a.f90.o"))
            .unwrap();
        let b = target_by_suffix(&targets, "b.f90.o");
        assert!(b.compile_deps().any(|d| d.0 == a));

        let exe = target_by_suffix(&targets, &names::executable("main"));
        assert_eq!(exe.kind, TargetKind::Executable);
        // Compile edge to its object, link edge to the archive.
        assert_eq!(exe.compile_deps().count(), 1);
        assert!(exe
            .link_deps()
            .any(|d| targets[d.0].kind == TargetKind::Archive));
    }

    #[test]
    fn test_missing_module_is_fatal() {
        let tmp = TempDir::new().unwrap();
        write_source(
            tmp.path(),
            "src/bad.f90",
            "module bad\nuse nowhere\nend module\n",
        );

        let (model, _runner) = fixture_model(tmp.path(), "demo");
        let err = build_target_graph(&model).unwrap_err();
        match err {
            Error::MissingModule { module, .. } => assert_eq!(module, "nowhere"),
            other => panic!("expected missing module, got {other:?}"),
        }
    }

    #[test]
    fn test_external_modules_are_elided() {
        let tmp = TempDir::new().unwrap();
        write_source(
            tmp.path(),
            "src/uses_mpi.f90",
            "module uses_mpi\nuse mpi\nend module\n",
        );

        let (mut model, _runner) = fixture_model(tmp.path(), "demo");
        model.external_modules.insert("mpi".to_string());

        let targets = build_target_graph(&model).unwrap();
        let object = target_by_suffix(&targets, "uses_mpi.f90.o");
        assert_eq!(object.compile_deps().count(), 0);
    }

    #[test]
    fn test_submodule_depends_on_parent() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/parent.f90", "module parent\nend module\n");
        write_source(
            tmp.path(),
            "src/child.f90",
            "submodule (parent) child\nend submodule\n",
        );

        let (model, _runner) = fixture_model(tmp.path(), "demo");
        let targets = build_target_graph(&model).unwrap();

        let parent_idx = targets
            .iter()
            .position(|t| t.output_file.to_string_lossy().ends_with("parent.f90.o"))
            .unwrap();
        let child = target_by_suffix(&targets, "child.f90.o");
        assert!(child.compile_deps().any(|d| d.0 == parent_idx));
    }

    #[test]
    fn test_c_header_include_folds_digest() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/defs.h", "#define N 4\n");
        write_source(tmp.path(), "src/impl.c", "#include \"defs.h\"\nint f() { return N; }\n");

        let (model, _runner) = fixture_model(tmp.path(), "demo");
        let targets = build_target_graph(&model).unwrap();

        let object = target_by_suffix(&targets, "impl.c.o");
        assert_eq!(object.kind, TargetKind::CObject);
        assert_eq!(object.include_digests.len(), 1);
        // Headers never become targets of their own.
        assert!(targets.iter().all(|t| !t
            .output_file
            .to_string_lossy()
            .ends_with("defs.h.o")));
    }

    #[test]
    fn test_test_scope_requires_opt_in() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/m.f90", "module m\nend module\n");
        write_source(
            tmp.path(),
            "test/check.f90",
            "program check\nuse m\nend program\n",
        );

        let (mut model, _runner) = fixture_model(tmp.path(), "demo");
        model.include_tests = false;
        let targets = build_target_graph(&model).unwrap();
        assert!(targets
            .iter()
            .all(|t| t.kind != TargetKind::Executable));

        model.include_tests = true;
        let targets = build_target_graph(&model).unwrap();
        let exe = target_by_suffix(&targets, &names::executable("check"));
        assert!(exe.output_file.to_string_lossy().contains("test"));
    }

    #[test]
    fn test_dependency_archives_in_link_order() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("top");
        let dep = tmp.path().join("lowlevel");

        write_source(&root, "src/top.f90", "module top\nuse lowlevel\nend module\n");
        write_source(
            &root,
            "app/main.f90",
            "program main\nuse top\nend program\n",
        );
        write_source(&dep, "src/lowlevel.f90", "module lowlevel\nend module\n");

        let (model, _runner) =
            crate::test_support::fixture_model_with_dep(&root, "top", &dep, "lowlevel");
        let targets = build_target_graph(&model).unwrap();

        let exe = target_by_suffix(&targets, &names::executable("main"));
        let archives: Vec<&str> = exe
            .link_deps()
            .filter(|d| targets[d.0].kind == TargetKind::Archive)
            .map(|d| targets[d.0].package.as_str())
            .collect();
        // Dependents precede dependencies on the link line.
        assert_eq!(archives, vec!["top", "lowlevel"]);
    }

    #[test]
    fn test_fortran_flags_include_module_output() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/m.f90", "module m\nend module\n");

        let (model, _runner) = fixture_model(tmp.path(), "demo");
        let targets = build_target_graph(&model).unwrap();
        let object = target_by_suffix(&targets, "m.f90.o");

        let joined = object.compile_flags.join(" ");
        assert!(joined.contains("-J"));
        assert!(joined.contains("demo"));
    }
}
