//! Light source parsing.
//!
//! Extracts just enough structure from Fortran and C/C++ sources to build
//! the target graph: which modules a file provides, which it uses, its
//! include dependencies, whether it is a program unit, and a content
//! digest for staleness checks.
//!
//! Fortran parsing is line-oriented over comment-stripped statements.
//! Continuation lines are folded for `use` statements only; other
//! continued statements are handled line by line.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::core::error::Error;
use crate::util::digest::digest_source;

/// Module names provided by the compiler runtime; never tracked as
/// build dependencies.
pub const INTRINSIC_MODULES: &[&str] = &[
    "iso_c_binding",
    "iso_fortran_env",
    "ieee_arithmetic",
    "ieee_exceptions",
    "ieee_features",
    "omp_lib",
    "omp_lib_kinds",
];

/// What kind of compilation unit a source file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitKind {
    /// A Fortran main program
    Program,
    /// A file containing only module definitions
    Module,
    /// A submodule extending a parent module
    Submodule,
    /// Free-standing subroutines/functions (possibly alongside modules)
    Subprogram,
    /// A C source
    CSource,
    /// A C or C++ header
    CHeader,
    /// A C++ source
    CppSource,
    /// Not yet classified
    #[default]
    Unknown,
}

/// Which part of a package a source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceScope {
    /// Library sources (any package)
    Lib,
    /// Non-library sources of a dependency package; never built
    Dep,
    /// Application sources of the root package
    App,
    /// Test sources
    Test,
    /// Example sources
    Example,
    /// Not yet assigned
    #[default]
    Unknown,
}

/// A parsed source file.
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    /// Canonical path on disk
    pub path: PathBuf,

    /// Compilation unit kind
    pub unit_kind: UnitKind,

    /// Package scope, assigned by the assembler
    pub scope: SourceScope,

    /// Lowercase module names this file defines
    pub provided_modules: BTreeSet<String>,

    /// Lowercase module names this file uses (intrinsics excluded)
    pub used_modules: BTreeSet<String>,

    /// Parent module chain for submodules, outermost first
    pub parent_modules: Vec<String>,

    /// Files pulled in via `include "..."` / `#include "..."`
    pub include_deps: Vec<String>,

    /// Executable name, present for program units
    pub exe_name: Option<String>,

    /// Native libraries to link when this unit becomes an executable
    pub link_libraries: Vec<String>,

    /// 64-bit content digest
    pub digest: u64,
}

impl SourceFile {
    /// Whether this source compiles to an object file.
    pub fn is_compiled(&self) -> bool {
        !matches!(self.unit_kind, UnitKind::CHeader | UnitKind::Unknown)
    }

    /// Whether this source yields an executable target.
    pub fn is_executable_unit(&self) -> bool {
        self.exe_name.is_some() || self.unit_kind == UnitKind::Program
    }
}

/// Parse one source file, dispatching on its extension.
pub fn parse_source(path: &Path) -> Result<SourceFile, Error> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Error::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "c" => Ok(parse_c_source(path, &text, UnitKind::CSource)),
        "h" | "hpp" | "hh" => Ok(parse_c_source(path, &text, UnitKind::CHeader)),
        "cpp" | "cc" | "cxx" => Ok(parse_c_source(path, &text, UnitKind::CppSource)),
        _ => parse_fortran_source(path, &text),
    }
}

/// Parse a Fortran source from text.
pub fn parse_fortran_source(path: &Path, text: &str) -> Result<SourceFile, Error> {
    let mut file = SourceFile {
        path: path.to_path_buf(),
        digest: digest_source(text),
        ..SourceFile::default()
    };

    let lines: Vec<&str> = text.lines().collect();
    let mut state = ParseState::default();

    let mut i = 0;
    while i < lines.len() {
        let line_no = i + 1;
        let statements = split_statements(lines[i]);

        for (s_idx, stmt) in statements.iter().enumerate() {
            let mut stmt = stmt.trim().to_string();
            if stmt.is_empty() {
                continue;
            }

            // Fold continuation lines for use statements.
            let is_last_on_line = s_idx + 1 == statements.len();
            if is_last_on_line && is_use_statement(&stmt) {
                while stmt.ends_with('&') && i + 1 < lines.len() {
                    stmt.pop();
                    i += 1;
                    let continued = split_statements(lines[i]);
                    let next = continued
                        .first()
                        .map(|s| s.trim().trim_start_matches('&').trim().to_string())
                        .unwrap_or_default();
                    stmt.push(' ');
                    stmt.push_str(&next);
                }
            }

            parse_fortran_statement(&stmt, path, line_no, &mut file, &mut state)?;
        }

        i += 1;
    }

    if file.unit_kind == UnitKind::Unknown && !file.provided_modules.is_empty() {
        file.unit_kind = UnitKind::Module;
    }

    Ok(file)
}

/// Parse a C/C++ source or header: quoted `#include` edges only.
pub fn parse_c_source(path: &Path, text: &str, kind: UnitKind) -> SourceFile {
    let mut file = SourceFile {
        path: path.to_path_buf(),
        unit_kind: kind,
        digest: digest_source(text),
        ..SourceFile::default()
    };

    for line in text.lines() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix('#') else {
            continue;
        };
        let Some(rest) = rest.trim_start().strip_prefix("include") else {
            continue;
        };
        let rest = rest.trim_start();
        // Angle-bracket includes point outside the project; not tracked.
        if let Some(name) = quoted_name(rest) {
            if !file.include_deps.iter().any(|d| d == &name) {
                file.include_deps.push(name);
            }
        }
    }

    file
}

#[derive(Default)]
struct ParseState {
    inside_module: bool,
    interface_depth: usize,
}

fn parse_fortran_statement(
    stmt: &str,
    path: &Path,
    line_no: usize,
    file: &mut SourceFile,
    state: &mut ParseState,
) -> Result<(), Error> {
    let lower = stmt.to_ascii_lowercase();

    // Preprocessor directives
    if let Some(rest) = lower.strip_prefix('#') {
        let rest = rest.trim_start();
        if rest.starts_with("include") {
            let offset = stmt.len() - stmt.trim_start_matches('#').trim_start().len();
            let after = &stmt[offset + "include".len()..];
            if let Some(name) = quoted_name(after.trim_start()) {
                if !file.include_deps.iter().any(|d| d == &name) {
                    file.include_deps.push(name);
                }
            }
        }
        return Ok(());
    }

    // use [, intrinsic ::] <name> [, only: ...]
    if is_use_statement(&lower) {
        let (name, intrinsic) = parse_use(&lower).ok_or_else(|| Error::Parse {
            file: path.to_path_buf(),
            line: line_no,
            column: 1,
            message: format!("malformed use statement: `{}`", stmt.trim()),
        })?;

        if !intrinsic && !INTRINSIC_MODULES.contains(&name.as_str()) {
            file.used_modules.insert(name);
        }
        return Ok(());
    }

    // include "<file>"
    if let Some(rest) = keyword(&lower, "include") {
        let offset = lower.len() - rest.len();
        let name = quoted_name(stmt[offset..].trim_start()).ok_or_else(|| Error::Parse {
            file: path.to_path_buf(),
            line: line_no,
            column: offset + 1,
            message: "include statement requires a quoted file name".into(),
        })?;
        if !file.include_deps.iter().any(|d| d == &name) {
            file.include_deps.push(name);
        }
        return Ok(());
    }

    // module <name> (but not `module procedure` etc.)
    if let Some(rest) = keyword(&lower, "module") {
        let name = leading_identifier(rest);
        if matches!(name, "procedure" | "function" | "subroutine" | "pure" | "impure" | "elemental")
        {
            return Ok(());
        }
        if name.is_empty() {
            return Err(Error::Parse {
                file: path.to_path_buf(),
                line: line_no,
                column: lower.len() - rest.len() + 1,
                message: "module declaration requires a name".into(),
            });
        }

        file.provided_modules.insert(name.to_string());
        state.inside_module = true;
        if matches!(file.unit_kind, UnitKind::Unknown | UnitKind::Module) {
            file.unit_kind = UnitKind::Module;
        }
        return Ok(());
    }

    // submodule (<parent>[:<grandparent>]) <name>
    if let Some(rest) = keyword(&lower, "submodule") {
        let rest = rest.trim_start();
        let inner = rest
            .strip_prefix('(')
            .and_then(|r| r.split_once(')'))
            .ok_or_else(|| Error::Parse {
                file: path.to_path_buf(),
                line: line_no,
                column: 1,
                message: "malformed submodule declaration: expected parenthesized parent".into(),
            })?;

        let (ancestors, after) = inner;
        for parent in ancestors.split(':') {
            let parent = parent.trim();
            if parent.is_empty() || leading_identifier(parent).len() != parent.len() {
                return Err(Error::Parse {
                    file: path.to_path_buf(),
                    line: line_no,
                    column: 1,
                    message: format!("invalid submodule parent `{}`", parent),
                });
            }
            file.parent_modules.push(parent.to_string());
        }

        let name = leading_identifier(after.trim_start());
        if name.is_empty() {
            return Err(Error::Parse {
                file: path.to_path_buf(),
                line: line_no,
                column: 1,
                message: "submodule declaration requires a name".into(),
            });
        }

        file.provided_modules.insert(name.to_string());
        state.inside_module = true;
        if file.unit_kind != UnitKind::Program {
            file.unit_kind = UnitKind::Submodule;
        }
        return Ok(());
    }

    // program <name>
    if let Some(rest) = keyword(&lower, "program") {
        let name = leading_identifier(rest);
        if !name.is_empty() {
            file.unit_kind = UnitKind::Program;
            file.exe_name = Some(name.to_string());
        }
        return Ok(());
    }

    // interface blocks: procedure declarations inside do not downgrade
    if keyword(&lower, "interface").is_some() {
        state.interface_depth += 1;
        return Ok(());
    }
    if let Some(rest) = keyword(&lower, "abstract") {
        if keyword(rest.trim_start(), "interface").is_some() {
            state.interface_depth += 1;
        }
        return Ok(());
    }

    // end markers
    if let Some(rest) = end_keyword(&lower) {
        match rest {
            "module" | "submodule" => state.inside_module = false,
            "interface" => state.interface_depth = state.interface_depth.saturating_sub(1),
            _ => {}
        }
        return Ok(());
    }

    // Free-standing procedures downgrade a module-only file.
    if !state.inside_module && state.interface_depth == 0 && declares_procedure(&lower) {
        if !matches!(file.unit_kind, UnitKind::Program) {
            file.unit_kind = UnitKind::Subprogram;
        }
    }

    Ok(())
}

/// Split a physical line into statements: strip `!` comments and split on
/// `;`, both quote-aware.
fn split_statements(line: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '!' => break,
                ';' => {
                    statements.push(std::mem::take(&mut current));
                }
                _ => current.push(ch),
            },
        }
    }

    statements.push(current);
    statements
}

/// Match `word` at the start of `s`; returns the remainder on success.
fn keyword<'a>(s: &'a str, word: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(word)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() || matches!(c, ',' | ':' | '(' | '"' | '\'') => Some(rest),
        _ => None,
    }
}

/// Match `end <unit>` / `end<unit>` statements; returns the unit word.
fn end_keyword(lower: &str) -> Option<&'static str> {
    let rest = keyword(lower, "end").map(|r| r.trim_start()).or_else(|| {
        for glued in ["endmodule", "endsubmodule", "endinterface"] {
            if let Some(r) = lower.strip_prefix(glued) {
                if r.chars().next().map_or(true, |c| c.is_whitespace()) {
                    return Some(&glued[3..]);
                }
            }
        }
        None
    })?;

    for unit in ["submodule", "module", "interface"] {
        if rest == unit || rest.starts_with(&format!("{} ", unit)) {
            return Some(match unit {
                "submodule" => "submodule",
                "module" => "module",
                _ => "interface",
            });
        }
    }
    Some("")
}

fn is_use_statement(stmt: &str) -> bool {
    let lower = stmt.trim_start().to_ascii_lowercase();
    keyword(&lower, "use").is_some()
}

/// Parse a lowercased use statement into (module name, has intrinsic
/// qualifier).
fn parse_use(lower: &str) -> Option<(String, bool)> {
    let rest = keyword(lower, "use")?;
    let rest = rest.trim_start();

    let (intrinsic, rest) = if let Some(r) = rest.strip_prefix(',') {
        let r = r.trim_start();
        if let Some(r) = keyword(r, "intrinsic") {
            (true, r.trim_start().strip_prefix("::")?.trim_start())
        } else if let Some(r) = keyword(r, "non_intrinsic") {
            (false, r.trim_start().strip_prefix("::")?.trim_start())
        } else {
            return None;
        }
    } else if let Some(r) = rest.strip_prefix("::") {
        (false, r.trim_start())
    } else {
        (false, rest)
    };

    let name = leading_identifier(rest);
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), intrinsic))
}

/// Leading Fortran identifier of `s` (letter, then letters/digits/underscores).
fn leading_identifier(s: &str) -> &str {
    let s = s.trim_start();
    let mut end = 0;
    for (idx, ch) in s.char_indices() {
        let valid = if idx == 0 {
            ch.is_ascii_alphabetic()
        } else {
            ch.is_ascii_alphanumeric() || ch == '_'
        };
        if !valid {
            break;
        }
        end = idx + ch.len_utf8();
    }
    &s[..end]
}

/// Extract the file name from a leading `"name"` or `'name'`.
fn quoted_name(s: &str) -> Option<String> {
    let mut chars = s.chars();
    let quote = chars.next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest: String = chars.collect();
    let end = rest.find(quote)?;
    let name = &rest[..end];
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Whether a top-level statement declares a free-standing procedure.
fn declares_procedure(lower: &str) -> bool {
    let tokens: Vec<&str> = lower.split_whitespace().take(6).collect();
    if tokens.is_empty() {
        return false;
    }
    if tokens[0] == "subroutine" {
        return true;
    }
    if tokens[0] == "block" && tokens.get(1) == Some(&"data") {
        return true;
    }
    // Type-prefixed functions: `integer function f(x)`,
    // `pure real(dp) function g(x)`.
    tokens
        .iter()
        .any(|t| *t == "function" || t.starts_with("function("))
        && !matches!(tokens[0], "end" | "module")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SourceFile {
        parse_fortran_source(Path::new("test.f90"), text).unwrap()
    }

    #[test]
    fn test_single_module() {
        let f = parse(
            "module demo\n\
             implicit none\n\
             integer :: x\n\
             end module demo\n",
        );
        assert_eq!(f.unit_kind, UnitKind::Module);
        assert!(f.provided_modules.contains("demo"));
        assert!(f.used_modules.is_empty());
    }

    #[test]
    fn test_module_names_are_lowercased() {
        let f = parse("MODULE Demo_Utils\nEND MODULE Demo_Utils\n");
        assert!(f.provided_modules.contains("demo_utils"));
    }

    #[test]
    fn test_use_statement_forms() {
        let f = parse(
            "module demo\n\
             use alpha\n\
             use :: beta\n\
             use gamma, only: thing\n\
             end module\n",
        );
        assert!(f.used_modules.contains("alpha"));
        assert!(f.used_modules.contains("beta"));
        assert!(f.used_modules.contains("gamma"));
    }

    #[test]
    fn test_intrinsic_modules_are_ignored() {
        let f = parse(
            "module x\n\
             use iso_fortran_env\n\
             use, intrinsic :: iso_c_binding\n\
             use omp_lib\n\
             end module\n",
        );
        assert!(f.used_modules.is_empty());
    }

    #[test]
    fn test_intrinsic_qualifier_wins_over_name() {
        // An explicitly intrinsic module of any name is never a dependency.
        let f = parse("use, intrinsic :: vendor_special\nend\n");
        assert!(f.used_modules.is_empty());
    }

    #[test]
    fn test_non_intrinsic_qualifier() {
        let f = parse("use, non_intrinsic :: helpers\nend\n");
        assert!(f.used_modules.contains("helpers"));
    }

    #[test]
    fn test_program_unit() {
        let f = parse(
            "program solver\n\
             use demo\n\
             call run()\n\
             end program solver\n",
        );
        assert_eq!(f.unit_kind, UnitKind::Program);
        assert_eq!(f.exe_name.as_deref(), Some("solver"));
        assert!(f.used_modules.contains("demo"));
    }

    #[test]
    fn test_submodule() {
        let f = parse(
            "submodule (parent) child\n\
             contains\n\
             module procedure impl\n\
             end procedure\n\
             end submodule child\n",
        );
        assert_eq!(f.unit_kind, UnitKind::Submodule);
        assert_eq!(f.parent_modules, vec!["parent"]);
        assert!(f.provided_modules.contains("child"));
    }

    #[test]
    fn test_submodule_with_grandparent() {
        let f = parse("submodule (ancestor:parent) leaf\nend submodule\n");
        assert_eq!(f.parent_modules, vec!["ancestor", "parent"]);
        assert!(f.provided_modules.contains("leaf"));
    }

    #[test]
    fn test_module_procedure_is_not_a_module() {
        let f = parse(
            "submodule (m) s\n\
             contains\n\
             module procedure compute\n\
             end procedure\n\
             end submodule\n",
        );
        assert_eq!(f.provided_modules.len(), 1);
        assert!(f.provided_modules.contains("s"));
    }

    #[test]
    fn test_free_subroutine_downgrades_module_file() {
        let f = parse(
            "module m\n\
             end module\n\
             subroutine helper()\n\
             end subroutine\n",
        );
        assert_eq!(f.unit_kind, UnitKind::Subprogram);
        assert!(f.provided_modules.contains("m"));
    }

    #[test]
    fn test_contained_procedures_do_not_downgrade() {
        let f = parse(
            "module m\n\
             contains\n\
             subroutine inside()\n\
             end subroutine\n\
             end module\n",
        );
        assert_eq!(f.unit_kind, UnitKind::Module);
    }

    #[test]
    fn test_interface_bodies_do_not_downgrade() {
        let f = parse(
            "module m\n\
             end module\n\
             interface\n\
             subroutine external_thing()\n\
             end subroutine\n\
             end interface\n",
        );
        // Still only module content at the top level.
        assert_eq!(f.unit_kind, UnitKind::Module);
    }

    #[test]
    fn test_type_prefixed_function_downgrades() {
        let f = parse(
            "module m\n\
             end module\n\
             integer function answer()\n\
             answer = 42\n\
             end function\n",
        );
        assert_eq!(f.unit_kind, UnitKind::Subprogram);
    }

    #[test]
    fn test_comments_are_stripped() {
        let f = parse(
            "module m ! the module\n\
             ! use hidden\n\
             use real_dep ! use other_hidden\n\
             end module\n",
        );
        assert!(f.used_modules.contains("real_dep"));
        assert!(!f.used_modules.contains("hidden"));
        assert!(!f.used_modules.contains("other_hidden"));
    }

    #[test]
    fn test_bang_inside_string_is_not_a_comment() {
        let f = parse(
            "program p\n\
             print *, 'hello! world'\n\
             end program p\n",
        );
        assert_eq!(f.unit_kind, UnitKind::Program);
    }

    #[test]
    fn test_use_continuation_folding() {
        let f = parse(
            "module m\n\
             use helpers, only: alpha, &\n\
                 & beta, gamma\n\
             end module\n",
        );
        assert!(f.used_modules.contains("helpers"));
    }

    #[test]
    fn test_include_statements() {
        let f = parse(
            "subroutine s\n\
             include \"params.inc\"\n\
             include 'Common.Inc'\n\
             end subroutine\n",
        );
        assert_eq!(f.include_deps, vec!["params.inc", "Common.Inc"]);
    }

    #[test]
    fn test_preprocessor_include() {
        let f = parse("#include \"defs.h\"\nmodule m\nend module\n");
        assert_eq!(f.include_deps, vec!["defs.h"]);
    }

    #[test]
    fn test_semicolon_separated_statements() {
        let f = parse("module a; end module; module b; end module\n");
        assert!(f.provided_modules.contains("a"));
        assert!(f.provided_modules.contains("b"));
    }

    #[test]
    fn test_self_use_is_recorded() {
        // A file may use a module it also defines; the graph builder
        // elides the self-edge.
        let f = parse(
            "module base\n\
             end module\n\
             module derived\n\
             use base\n\
             end module\n",
        );
        assert!(f.used_modules.contains("base"));
        assert!(f.provided_modules.contains("base"));
    }

    #[test]
    fn test_malformed_use_is_a_parse_error() {
        let err = parse_fortran_source(Path::new("bad.f90"), "use\n").unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_submodule_is_a_parse_error() {
        let err =
            parse_fortran_source(Path::new("bad.f90"), "submodule missing_parens\n").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_c_source_includes() {
        let f = parse_c_source(
            Path::new("x.c"),
            "#include \"defs.h\"\n#include <stdio.h>\n#include \"util/more.h\"\nint main() {}\n",
            UnitKind::CSource,
        );
        assert_eq!(f.unit_kind, UnitKind::CSource);
        assert_eq!(f.include_deps, vec!["defs.h", "util/more.h"]);
    }

    #[test]
    fn test_c_header_is_not_compiled() {
        let f = parse_c_source(Path::new("x.h"), "#pragma once\n", UnitKind::CHeader);
        assert!(!f.is_compiled());
    }

    #[test]
    fn test_digest_changes_with_content() {
        let a = parse("module m\nend module\n");
        let b = parse("module m\ninteger :: x\nend module\n");
        assert_ne!(a.digest, b.digest);
    }
}
