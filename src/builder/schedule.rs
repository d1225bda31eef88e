//! Topological sorting and schedule-region assignment.
//!
//! Depth-first sort over the target DAG with cycle detection. On the
//! post-order unwind each target gets its expected digest (source digest,
//! dependency digests sorted by output path, flag string), is checked
//! against the digest cache, and is assigned a schedule region. Targets
//! within one region have no dependency paths between them and may run in
//! parallel; regions execute in strictly increasing order.

use crate::builder::digest_cache;
use crate::core::error::Error;
use crate::core::model::BuildModel;
use crate::core::target::{Target, TargetId};
use crate::util::digest::DigestBuilder;

/// The execution queue: non-skip targets in region-major order plus the
/// partition separating regions.
#[derive(Debug, Default)]
pub struct Schedule {
    /// Non-skip targets ordered by (region, output file)
    pub queue: Vec<TargetId>,
    /// Start index of each region within `queue`
    pub partition: Vec<usize>,
    /// Number of up-to-date targets skipped
    pub skipped: usize,
}

impl Schedule {
    /// Total number of targets to execute.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether everything was up to date.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Iterate the queue region by region.
    pub fn regions(&self) -> impl Iterator<Item = &[TargetId]> {
        (0..self.partition.len()).map(move |i| {
            let start = self.partition[i];
            let end = self
                .partition
                .get(i + 1)
                .copied()
                .unwrap_or(self.queue.len());
            &self.queue[start..end]
        })
    }
}

/// Sort the DAG, mark up-to-date targets, and partition the rest into
/// parallel-safe regions.
pub fn sort_targets(model: &BuildModel, targets: &mut [Target]) -> Result<Schedule, Error> {
    for target in targets.iter_mut() {
        target.sorted = false;
        target.visiting = false;
        target.skip = false;
        target.schedule_region = 0;
        target.digest_expected = None;
        target.digest_cached = None;
    }

    let mut stack = Vec::new();
    for idx in 0..targets.len() {
        visit(idx, model, targets, &mut stack)?;
    }

    let mut pending: Vec<TargetId> = Vec::new();
    let mut skipped = 0;
    for (idx, target) in targets.iter().enumerate() {
        if target.skip {
            skipped += 1;
        } else {
            pending.push(TargetId(idx));
        }
    }

    pending.sort_by(|a, b| {
        let ta = &targets[a.0];
        let tb = &targets[b.0];
        ta.schedule_region
            .cmp(&tb.schedule_region)
            .then_with(|| ta.output_file.cmp(&tb.output_file))
    });

    let mut partition = Vec::new();
    let mut last_region = None;
    for (pos, id) in pending.iter().enumerate() {
        let region = targets[id.0].schedule_region;
        if last_region != Some(region) {
            partition.push(pos);
            last_region = Some(region);
        }
    }

    Ok(Schedule {
        queue: pending,
        partition,
        skipped,
    })
}

fn visit(
    idx: usize,
    model: &BuildModel,
    targets: &mut [Target],
    stack: &mut Vec<usize>,
) -> Result<(), Error> {
    if targets[idx].sorted {
        return Ok(());
    }
    if targets[idx].visiting {
        let pos = stack.iter().position(|&i| i == idx).unwrap_or(0);
        let mut names: Vec<String> = stack[pos..]
            .iter()
            .map(|&i| targets[i].display_name())
            .collect();
        names.push(targets[idx].display_name());
        return Err(Error::Cycle { names });
    }

    targets[idx].visiting = true;
    stack.push(idx);

    let mut deps: Vec<usize> = targets[idx]
        .dependencies
        .iter()
        .map(|d| d.target.0)
        .collect();
    deps.sort_unstable();
    deps.dedup();

    for &dep in &deps {
        visit(dep, model, targets, stack)?;
    }

    stack.pop();
    targets[idx].visiting = false;

    // Expected digest, bottom-up: source content, folded include digests,
    // dependency digests ordered by output path, and the flag string.
    let mut digest = DigestBuilder::new();
    if let Some(sref) = targets[idx].source {
        digest.update_digest(model.source(sref).digest);
    }
    for inc in &targets[idx].include_digests {
        digest.update_digest(*inc);
    }

    let mut by_output = deps.clone();
    by_output.sort_by(|a, b| targets[*a].output_file.cmp(&targets[*b].output_file));
    for dep in by_output {
        digest.update_digest(
            targets[dep]
                .digest_expected
                .expect("dependency digest computed in post-order"),
        );
    }
    digest.update_str(&targets[idx].flag_string());
    let expected = digest.finish();

    let cached = digest_cache::read_cached(&targets[idx].output_file);
    let deps_fresh = deps.iter().all(|&d| targets[d].skip);

    targets[idx].digest_expected = Some(expected);
    targets[idx].digest_cached = cached;
    targets[idx].skip =
        deps_fresh && cached == Some(expected) && targets[idx].output_file.exists();

    targets[idx].schedule_region = deps
        .iter()
        .map(|&d| targets[d].schedule_region + 1)
        .max()
        .unwrap_or(0);
    targets[idx].sorted = true;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::targets::build_target_graph;
    use crate::core::target::{EdgeKind, TargetKind};
    use crate::test_support::{fixture_model, write_source};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn region_of(targets: &[Target], suffix: &str) -> usize {
        targets
            .iter()
            .find(|t| t.output_file.to_string_lossy().ends_with(suffix))
            .unwrap_or_else(|| panic!("no target ending in {}", suffix))
            .schedule_region
    }

    #[test]
    fn test_module_chain_regions() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/a.f90", "module a\nend module\n");
        write_source(tmp.path(), "src/b.f90", "module b\nuse a\nend module\n");
        write_source(
            tmp.path(),
            "app/main.f90",
            "program main\nuse b\nend program\n",
        );

        let (model, _runner) = fixture_model(tmp.path(), "demo");
        let mut targets = build_target_graph(&model).unwrap();
        let schedule = sort_targets(&model, &mut targets).unwrap();

        assert_eq!(region_of(&targets, "a.f90.o"), 0);
        assert_eq!(region_of(&targets, "b.f90.o"), 1);
        assert_eq!(region_of(&targets, "main.f90.o"), 2);

        // The archive waits for both library objects; the executable for
        // its object and the archive.
        assert_eq!(region_of(&targets, "libdemo.a"), 2);
        let exe_region = targets
            .iter()
            .find(|t| t.kind == TargetKind::Executable)
            .unwrap()
            .schedule_region;
        assert_eq!(exe_region, 3);

        // Everything is stale on a fresh tree.
        assert_eq!(schedule.skipped, 0);
        assert_eq!(schedule.len(), targets.len());
    }

    #[test]
    fn test_queue_is_region_major_and_stable() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/z.f90", "module z\nend module\n");
        write_source(tmp.path(), "src/a.f90", "module a\nend module\n");
        write_source(tmp.path(), "src/m.f90", "module m\nuse a\nuse z\nend module\n");

        let (model, _runner) = fixture_model(tmp.path(), "demo");
        let mut targets = build_target_graph(&model).unwrap();
        let schedule = sort_targets(&model, &mut targets).unwrap();

        let regions: Vec<Vec<String>> = schedule
            .regions()
            .map(|r| {
                r.iter()
                    .map(|id| {
                        targets[id.0]
                            .output_file
                            .file_name()
                            .unwrap()
                            .to_string_lossy()
                            .into_owned()
                    })
                    .collect()
            })
            .collect();

        // Region 0 holds the independent modules in output order.
        assert_eq!(regions[0], vec!["a.f90.o", "z.f90.o"]);
        assert_eq!(regions[1], vec!["m.f90.o"]);
    }

    #[test]
    fn test_independent_targets_share_a_region() {
        let tmp = TempDir::new().unwrap();
        for name in ["w", "x", "y", "z"] {
            write_source(
                tmp.path(),
                &format!("src/{}.f90", name),
                &format!("module {}\nend module\n", name),
            );
        }

        let (model, _runner) = fixture_model(tmp.path(), "demo");
        let mut targets = build_target_graph(&model).unwrap();
        let schedule = sort_targets(&model, &mut targets).unwrap();

        let first_region = schedule.regions().next().unwrap();
        assert_eq!(first_region.len(), 4);

        // No dependency paths among same-region targets.
        for a in first_region {
            for b in first_region {
                if a != b {
                    assert!(!reaches(&targets, *a, *b));
                }
            }
        }
    }

    fn reaches(targets: &[Target], from: TargetId, to: TargetId) -> bool {
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            stack.extend(targets[id.0].dependencies.iter().map(|d| d.target));
        }
        false
    }

    #[test]
    fn test_cycle_is_fatal_and_names_participants() {
        let mut targets = vec![
            Target::new(
                TargetKind::FortranObject,
                "demo",
                PathBuf::from("/b/demo/a.f90.o"),
            ),
            Target::new(
                TargetKind::FortranObject,
                "demo",
                PathBuf::from("/b/demo/b.f90.o"),
            ),
        ];
        targets[0].depend(TargetId(1), EdgeKind::Compile);
        targets[1].depend(TargetId(0), EdgeKind::Compile);

        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/m.f90", "module m\nend module\n");
        let (model, _runner) = fixture_model(tmp.path(), "demo");

        let err = sort_targets(&model, &mut targets).unwrap_err();
        match err {
            Error::Cycle { names } => {
                assert!(names.iter().any(|n| n.contains("a.f90.o")));
                assert!(names.iter().any(|n| n.contains("b.f90.o")));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_digest_changes_when_flags_change() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/m.f90", "module m\nend module\n");

        let (model, _runner) = fixture_model(tmp.path(), "demo");
        let mut targets = build_target_graph(&model).unwrap();
        sort_targets(&model, &mut targets).unwrap();
        let before = targets[0].digest_expected;

        targets[0].compile_flags.push("-O3".to_string());
        sort_targets(&model, &mut targets).unwrap();
        assert_ne!(before, targets[0].digest_expected);
    }

    #[test]
    fn test_dependency_digest_propagates() {
        let tmp = TempDir::new().unwrap();
        write_source(tmp.path(), "src/a.f90", "module a\nend module\n");
        write_source(tmp.path(), "src/b.f90", "module b\nuse a\nend module\n");

        let (model, _runner) = fixture_model(tmp.path(), "demo");
        let mut targets = build_target_graph(&model).unwrap();
        sort_targets(&model, &mut targets).unwrap();

        let b_idx = targets
            .iter()
            .position(|t| t.output_file.to_string_lossy().ends_with("b.f90.o"))
            .unwrap();
        let b_before = targets[b_idx].digest_expected;

        // Changing a's flags must ripple into b's expected digest.
        let a_idx = targets
            .iter()
            .position(|t| t.output_file.to_string_lossy().ends_with("a.f90.o"))
            .unwrap();
        targets[a_idx].compile_flags.push("-g".to_string());
        sort_targets(&model, &mut targets).unwrap();
        assert_ne!(b_before, targets[b_idx].digest_expected);
    }
}
