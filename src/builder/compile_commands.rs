//! The `compile_commands.json` table.
//!
//! Accumulates one `{directory, file, arguments}` record per successful
//! (or dry-run) compile and serializes the table in the standard format.
//! The table is append-only and shared across workers, so appends go
//! through a mutex.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One entry of `compile_commands.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileCommand {
    /// Absolute build root the arguments are relative to
    pub directory: String,
    /// The compiled source file
    pub file: String,
    /// Flat argument list beginning with the compiler executable
    pub arguments: Vec<String>,
}

/// Thread-safe accumulator for compile commands.
#[derive(Debug, Default)]
pub struct CommandTable {
    entries: Mutex<Vec<CompileCommand>>,
}

impl CommandTable {
    /// Create an empty table.
    pub fn new() -> Self {
        CommandTable::default()
    }

    /// Append one compile record.
    pub fn register(&self, directory: &Path, file: &Path, arguments: Vec<String>) {
        let entry = CompileCommand {
            directory: directory.display().to_string(),
            file: file.display().to_string(),
            arguments,
        };
        self.entries.lock().unwrap().push(entry);
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether no commands were recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the recorded entries, sorted by file for stable output.
    pub fn entries(&self) -> Vec<CompileCommand> {
        let mut entries = self.entries.lock().unwrap().clone();
        entries.sort_by(|a, b| a.file.cmp(&b.file));
        entries
    }

    /// Write `compile_commands.json`, only when at least one command was
    /// recorded.
    pub fn write(&self, path: &Path) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let json = serde_json::to_string_pretty(&self.entries())?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

/// Parse an existing `compile_commands.json`.
pub fn load(path: &Path) -> Result<Vec<CompileCommand>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let entries = serde_json::from_str(&text)
        .with_context(|| format!("malformed compile commands in {}", path.display()))?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample(table: &CommandTable) {
        table.register(
            Path::new("/proj/build/debug"),
            Path::new("/proj/src/m.f90"),
            vec![
                "gfortran".to_string(),
                "-c".to_string(),
                "/proj/src/m.f90".to_string(),
                "-o".to_string(),
                "/proj/build/debug/demo/m.f90.o".to_string(),
            ],
        );
    }

    #[test]
    fn test_empty_table_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("compile_commands.json");

        let table = CommandTable::new();
        table.write(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_round_trip_is_stable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("compile_commands.json");

        let table = CommandTable::new();
        sample(&table);
        table.register(
            Path::new("/proj/build/debug"),
            Path::new("/proj/src/a.f90"),
            vec!["gfortran".to_string(), "-c".to_string()],
        );
        table.write(&path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, table.entries());

        // Re-emitting parsed content is byte-identical.
        let again = tmp.path().join("again.json");
        std::fs::write(&again, serde_json::to_string_pretty(&loaded).unwrap()).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            std::fs::read_to_string(&again).unwrap()
        );
    }

    #[test]
    fn test_entries_sorted_by_file() {
        let table = CommandTable::new();
        table.register(Path::new("/b"), Path::new("/z.f90"), vec!["fc".into()]);
        table.register(Path::new("/b"), Path::new("/a.f90"), vec!["fc".into()]);

        let entries = table.entries();
        assert_eq!(entries[0].file, "/a.f90");
        assert_eq!(entries[1].file, "/z.f90");
    }

    #[test]
    fn test_concurrent_appends() {
        use std::sync::Arc;

        let table = Arc::new(CommandTable::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for j in 0..16 {
                        table.register(
                            Path::new("/b"),
                            &PathBuf::from(format!("/src/f{}_{}.f90", i, j)),
                            vec!["fc".to_string()],
                        );
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.len(), 128);
    }
}
