//! Implementation of `capstan clean`.

use std::path::Path;

use anyhow::{bail, Result};

use crate::core::manifest::MANIFEST_FILE;
use crate::util::fs::remove_dir_all_if_exists;

/// Remove the build tree of the package at `manifest_dir`.
///
/// Refuses to touch directories that do not hold a manifest, so a stray
/// invocation never deletes an unrelated `build/` directory.
pub fn clean(manifest_dir: &Path) -> Result<()> {
    if !manifest_dir.join(MANIFEST_FILE).is_file() {
        bail!(
            "no {} found in {}; not a capstan package",
            MANIFEST_FILE,
            manifest_dir.display()
        );
    }

    let build_dir = manifest_dir.join("build");
    remove_dir_all_if_exists(&build_dir)?;
    tracing::info!("removed {}", build_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_build_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(MANIFEST_FILE),
            "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();
        std::fs::create_dir_all(tmp.path().join("build/debug/demo")).unwrap();

        clean(tmp.path()).unwrap();
        assert!(!tmp.path().join("build").exists());
    }

    #[test]
    fn test_clean_refuses_outside_a_package() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("build")).unwrap();

        assert!(clean(tmp.path()).is_err());
        assert!(tmp.path().join("build").exists());
    }

    #[test]
    fn test_clean_without_build_dir_is_ok() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(MANIFEST_FILE),
            "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();

        clean(tmp.path()).unwrap();
    }
}
