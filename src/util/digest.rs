//! Content digests for incremental-build staleness checks.
//!
//! Digests are 64-bit FNV-1a. Source files are digested after line
//! normalization (CRLF folded to LF, trailing whitespace trimmed) and
//! tab expansion with 8-column stops, so that editors that only touch
//! whitespace do not force rebuilds.

use std::hash::Hasher;

use fnv::FnvHasher;

/// Incremental FNV-1a digest builder.
///
/// Components are separated by a NUL byte so that adjacent fields cannot
/// collide by concatenation.
#[derive(Default)]
pub struct DigestBuilder {
    hasher: FnvHasher,
}

impl DigestBuilder {
    /// Create a new digest builder.
    pub fn new() -> Self {
        DigestBuilder {
            hasher: FnvHasher::default(),
        }
    }

    /// Add raw bytes to the digest.
    pub fn update(&mut self, bytes: &[u8]) -> &mut Self {
        self.hasher.write(bytes);
        self
    }

    /// Add a string component to the digest.
    pub fn update_str(&mut self, s: &str) -> &mut Self {
        self.hasher.write(s.as_bytes());
        self.hasher.write(b"\0");
        self
    }

    /// Add a previously computed digest as a component.
    pub fn update_digest(&mut self, digest: u64) -> &mut Self {
        self.hasher.write(&digest.to_le_bytes());
        self
    }

    /// Finalize and return the 64-bit digest.
    pub fn finish(self) -> u64 {
        self.hasher.finish()
    }
}

/// Digest a byte slice directly, with no normalization.
pub fn digest_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

/// Digest source text after line normalization and tab expansion.
pub fn digest_source(text: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    for line in text.lines() {
        let expanded = expand_tabs(line.trim_end());
        hasher.write(expanded.as_bytes());
        hasher.write(b"\n");
    }
    hasher.finish()
}

/// Expand tabs to spaces with tab stops every 8 columns.
fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len());
    let mut col = 0usize;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = 8 - (col % 8);
            for _ in 0..pad {
                out.push(' ');
            }
            col += pad;
        } else {
            out.push(ch);
            col += 1;
        }
    }
    out
}

/// Render a digest as the fixed-width hex form used in `.digest` files.
pub fn to_hex(digest: u64) -> String {
    format!("{:016x}", digest)
}

/// Parse the hex form written by [`to_hex`].
pub fn from_hex(s: &str) -> Option<u64> {
    u64::from_str_radix(s.trim(), 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable() {
        let a = digest_source("module demo\nend module\n");
        let b = digest_source("module demo\nend module\n");
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_ignores_trailing_whitespace() {
        let a = digest_source("module demo   \nend module\t\n");
        let b = digest_source("module demo\nend module\n");
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_ignores_line_endings() {
        let a = digest_source("module demo\r\nend module\r\n");
        let b = digest_source("module demo\nend module\n");
        assert_eq!(a, b);
    }

    #[test]
    fn test_tab_expansion_changes_columns_not_content() {
        // A tab and its 8-column expansion digest identically.
        let a = digest_source("\tcall foo()\n");
        let b = digest_source("        call foo()\n");
        assert_eq!(a, b);

        // But actual content changes are visible.
        let c = digest_source("        call bar()\n");
        assert_ne!(a, c);
    }

    #[test]
    fn test_expand_tabs_midline() {
        assert_eq!(expand_tabs("ab\tc"), "ab      c");
        assert_eq!(expand_tabs("abcdefgh\tc"), "abcdefgh        c");
    }

    #[test]
    fn test_hex_round_trip() {
        let d = digest_bytes(b"capstan");
        assert_eq!(from_hex(&to_hex(d)), Some(d));
        assert_eq!(to_hex(d).len(), 16);
    }

    #[test]
    fn test_builder_separates_components() {
        let a = {
            let mut b = DigestBuilder::new();
            b.update_str("ab").update_str("c");
            b.finish()
        };
        let b = {
            let mut b = DigestBuilder::new();
            b.update_str("a").update_str("bc");
            b.finish()
        };
        assert_ne!(a, b);
    }
}
