//! Digest cache: sidecar `.digest` files next to build outputs.
//!
//! For a target output `X`, `X.digest` stores the 64-bit expected digest
//! in hex. The sorter reads it to decide staleness; the executor rewrites
//! it after a successful build. Absence or mismatch forces a rebuild.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::digest::{from_hex, to_hex};

/// Sidecar digest file for an output.
pub fn digest_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".digest");
    PathBuf::from(name)
}

/// Sidecar log file for an output.
pub fn log_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".log");
    PathBuf::from(name)
}

/// Read the cached digest next to `output`, if present and well-formed.
pub fn read_cached(output: &Path) -> Option<u64> {
    let text = std::fs::read_to_string(digest_path(output)).ok()?;
    from_hex(&text)
}

/// Record `digest` next to `output` after a successful build.
pub fn write(output: &Path, digest: u64) -> Result<()> {
    let path = digest_path(output);
    std::fs::write(&path, to_hex(digest))
        .with_context(|| format!("failed to write digest file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_digest_round_trip() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("m.f90.o");

        assert_eq!(read_cached(&output), None);

        write(&output, 0xdead_beef_0123_4567).unwrap();
        assert_eq!(read_cached(&output), Some(0xdead_beef_0123_4567));
    }

    #[test]
    fn test_sidecar_naming() {
        assert_eq!(
            digest_path(Path::new("/b/demo/m.f90.o")),
            PathBuf::from("/b/demo/m.f90.o.digest")
        );
        assert_eq!(
            log_path(Path::new("/b/demo/m.f90.o")),
            PathBuf::from("/b/demo/m.f90.o.log")
        );
    }

    #[test]
    fn test_corrupt_digest_reads_as_missing() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("x.o");
        std::fs::write(digest_path(&output), "not-hex").unwrap();
        assert_eq!(read_cached(&output), None);
    }
}
