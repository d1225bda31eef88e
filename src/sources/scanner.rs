//! Source file discovery.
//!
//! Walks project directories and returns candidate source files filtered
//! by extension. Hidden files and directories are skipped, paths are
//! canonicalized, and duplicates are dropped against a caller-supplied
//! seen-set.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::util::fs::normalize_path;

/// Default Fortran source extensions.
pub const FORTRAN_EXTENSIONS: &[&str] = &["f90", "f"];

/// C and C++ source/header extensions.
pub const C_EXTENSIONS: &[&str] = &["c", "h", "cpp", "hpp"];

/// Which extension families to accept during a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    /// Extra Fortran suffixes routed through a preprocessor (e.g. "fpp")
    pub preprocessed_suffixes: Vec<String>,
}

impl ScanFilter {
    /// Create a filter with extra preprocessed Fortran suffixes.
    pub fn with_suffixes(suffixes: &[String]) -> Self {
        ScanFilter {
            preprocessed_suffixes: suffixes.to_vec(),
        }
    }

    /// Whether the path carries a recognized source extension.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().map(|e| e.to_string_lossy()) else {
            return false;
        };

        let lower = ext.to_ascii_lowercase();
        if FORTRAN_EXTENSIONS.contains(&lower.as_str()) {
            return true;
        }
        if C_EXTENSIONS.contains(&lower.as_str()) {
            return true;
        }
        // User-declared preprocessed suffixes match case-sensitively.
        self.preprocessed_suffixes.iter().any(|s| *s == ext)
    }
}

/// Whether a directory entry is hidden (leading dot).
fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Enumerate source files under `root`.
///
/// Canonical paths already present in `seen` are dropped; newly returned
/// paths are added to it. Returns paths in sorted order for deterministic
/// downstream processing. A missing root yields an empty list.
pub fn scan_sources(
    root: &Path,
    recursive: bool,
    filter: &ScanFilter,
    seen: &mut BTreeSet<PathBuf>,
) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut found = Vec::new();

    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!("skipping unreadable entry under {}: {}", root.display(), err);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !filter.matches(path) {
            continue;
        }

        let canonical = normalize_path(path);
        if seen.insert(canonical.clone()) {
            found.push(canonical);
        }
    }

    found.sort();
    found
}
