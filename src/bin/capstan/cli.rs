//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use capstan::builder::toolchain::Profile;

/// Capstan - a package manager and build system for Fortran
#[derive(Parser)]
#[command(name = "capstan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output (plain progress, debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new Capstan package
    New(NewArgs),

    /// Build the current package
    Build(BuildArgs),

    /// Build and run an executable
    Run(RunArgs),

    /// Build and run the test executables
    Test(TestArgs),

    /// Remove build artifacts
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct NewArgs {
    /// Package name
    pub name: String,

    /// Create a library package only
    #[arg(long, conflicts_with = "app")]
    pub lib: bool,

    /// Create an application package only
    #[arg(long)]
    pub app: bool,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Build profile
    #[arg(long, default_value = "debug")]
    pub profile: Profile,

    /// Shorthand for --profile release
    #[arg(long, conflicts_with = "profile")]
    pub release: bool,

    /// Number of parallel jobs
    #[arg(short, long, env = "CAPSTAN_JOBS")]
    pub jobs: Option<usize>,

    /// Build test executables too
    #[arg(long)]
    pub tests: bool,

    /// Record commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Replace the profile's default Fortran flags
    #[arg(long)]
    pub flags: Option<String>,
}

#[derive(Args)]
pub struct RunArgs {
    /// Executable to run (defaults to the only one)
    pub target: Option<String>,

    /// Run an example instead of an app executable
    #[arg(long)]
    pub example: bool,

    /// List available executables instead of running
    #[arg(long)]
    pub list: bool,

    #[command(flatten)]
    pub build: BuildArgs,

    /// Arguments forwarded to the executable
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct TestArgs {
    /// Test executable to run (defaults to all)
    pub target: Option<String>,

    /// List available tests instead of running
    #[arg(long)]
    pub list: bool,

    #[command(flatten)]
    pub build: BuildArgs,

    /// Arguments forwarded to the test executables
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct CleanArgs {}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
