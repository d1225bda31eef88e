//! Subcommand implementations.

pub mod build;
pub mod clean;
pub mod completions;
pub mod new;
pub mod run;

use std::path::PathBuf;

use anyhow::{bail, Result};

use capstan::core::manifest::MANIFEST_FILE;

/// Locate the package root: the nearest ancestor of the working
/// directory holding a manifest.
pub fn find_package_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let mut dir = cwd.as_path();

    loop {
        if dir.join(MANIFEST_FILE).is_file() {
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => bail!(
                "no {} found in {} or any parent directory",
                MANIFEST_FILE,
                cwd.display()
            ),
        }
    }
}
