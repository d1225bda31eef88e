//! Build progress rendering.
//!
//! Two modes: pretty (interactive TTY) keeps a sticky line per in-flight
//! target, repainted in place with ANSI erase-line/cursor movement, yellow
//! while the tool runs and green/red on completion. Plain emits one line
//! per completion event with no colors. All writes go through one mutex;
//! cursor movement is only valid while nothing else touches the stream.

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const ERASE_LINE: &str = "\x1b[2K";

/// How progress is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMode {
    /// Sticky per-target lines with colors and in-place updates
    Pretty,
    /// One line per event, no colors
    Plain,
    /// No output (machine use, tests)
    Quiet,
}

/// Pick a console mode for the current stdout.
pub fn detect_console_mode(verbose: bool, quiet: bool) -> ConsoleMode {
    if quiet {
        ConsoleMode::Quiet
    } else if verbose {
        ConsoleMode::Plain
    } else if stdout_supports_ansi() {
        ConsoleMode::Pretty
    } else {
        ConsoleMode::Plain
    }
}

/// Whether stdout can take ANSI sequences.
///
/// Ordinary terminals answer via `isatty`; MSYS/Cygwin terminals on
/// Windows present as named pipes whose names identify a pty.
pub fn stdout_supports_ansi() -> bool {
    if std::io::stdout().is_terminal() {
        return true;
    }

    #[cfg(windows)]
    {
        if let Some(name) = windows_pipe::stdout_pipe_name() {
            return is_msys_pty_name(&name);
        }
    }

    false
}

/// Match MSYS/Cygwin pseudo-terminal pipe names:
/// `\cygwin-<hex>-pty<N>-from-master`, `\msys-<hex>-pty<N>-to-master`.
pub fn is_msys_pty_name(name: &str) -> bool {
    let name = name.trim_start_matches('\\');
    let Some(rest) = name
        .strip_prefix("cygwin-")
        .or_else(|| name.strip_prefix("msys-"))
    else {
        return false;
    };

    let Some(idx) = rest.find("-pty") else {
        return false;
    };
    let hex = &rest[..idx];
    if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }

    let tail = &rest[idx + "-pty".len()..];
    let digits = tail.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return false;
    }

    matches!(&tail[digits..], "-from-master" | "-to-master")
}

#[cfg(windows)]
mod windows_pipe {
    use std::os::windows::io::AsRawHandle;

    #[repr(C)]
    struct FileNameInfo {
        file_name_length: u32,
        file_name: [u16; 1024],
    }

    #[link(name = "kernel32")]
    extern "system" {
        fn GetFileInformationByHandleEx(
            handle: *mut std::ffi::c_void,
            class: u32,
            info: *mut std::ffi::c_void,
            size: u32,
        ) -> i32;
    }

    const FILE_NAME_INFO: u32 = 2;

    /// The NT name of the pipe behind stdout, if stdout is a pipe.
    pub fn stdout_pipe_name() -> Option<String> {
        let handle = std::io::stdout().as_raw_handle();
        let mut info = FileNameInfo {
            file_name_length: 0,
            file_name: [0; 1024],
        };

        let ok = unsafe {
            GetFileInformationByHandleEx(
                handle as *mut _,
                FILE_NAME_INFO,
                &mut info as *mut _ as *mut _,
                std::mem::size_of::<FileNameInfo>() as u32,
            )
        };
        if ok == 0 {
            return None;
        }

        let len = (info.file_name_length as usize / 2).min(info.file_name.len());
        Some(String::from_utf16_lossy(&info.file_name[..len]))
    }
}

/// Handle to a target's sticky line.
#[derive(Debug, Clone, Copy)]
pub struct ProgressToken {
    line: usize,
}

#[derive(Debug, Default)]
struct ConsoleState {
    /// Total lines printed so far in pretty mode
    lines_printed: usize,
}

/// Shared progress reporter for one build.
#[derive(Debug)]
pub struct BuildProgress {
    mode: ConsoleMode,
    total: usize,
    started: AtomicUsize,
    completed: AtomicUsize,
    state: Mutex<ConsoleState>,
}

impl BuildProgress {
    /// Create a reporter for `total` scheduled targets.
    pub fn new(mode: ConsoleMode, total: usize) -> Self {
        BuildProgress {
            mode,
            total,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            state: Mutex::new(ConsoleState::default()),
        }
    }

    /// Number of completed targets so far.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn percent(&self, done: usize) -> usize {
        if self.total == 0 {
            100
        } else {
            done * 100 / self.total
        }
    }

    /// A target began executing; returns the token for its sticky line.
    pub fn target_started(&self, verb: &str, name: &str) -> ProgressToken {
        let k = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock().unwrap();

        match self.mode {
            ConsoleMode::Pretty => {
                let line = state.lines_printed;
                println!(
                    "{}{} {} [{}/{}]{}",
                    YELLOW, verb, name, k, self.total, RESET
                );
                let _ = std::io::stdout().flush();
                state.lines_printed += 1;
                ProgressToken { line }
            }
            _ => ProgressToken { line: 0 },
        }
    }

    /// A target finished; repaints its line (pretty) or emits one event
    /// line (plain).
    pub fn target_finished(&self, token: ProgressToken, name: &str, ok: bool) {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let state = self.state.lock().unwrap();

        match self.mode {
            ConsoleMode::Pretty => {
                let (color, status) = if ok { (GREEN, "done") } else { (RED, "failed") };
                let text = format!(
                    "{}[{:3}%] {} {}{}",
                    color,
                    self.percent(done),
                    name,
                    status,
                    RESET
                );
                let up = state.lines_printed - token.line;
                // Move to the target's line, erase, rewrite, move back.
                print!("\x1b[{}A\r{}{}\x1b[{}B\r", up, ERASE_LINE, text, up);
                let _ = std::io::stdout().flush();
            }
            ConsoleMode::Plain => {
                let status = if ok { "done" } else { "FAILED" };
                println!("[{:3}%] {} {}", self.percent(done), name, status);
            }
            ConsoleMode::Quiet => {}
        }
    }

    /// Emit a freestanding message below the progress area.
    pub fn message(&self, text: &str) {
        let mut state = self.state.lock().unwrap();
        match self.mode {
            ConsoleMode::Quiet => {}
            _ => {
                println!("{}", text);
                state.lines_printed += 1;
            }
        }
    }
}
