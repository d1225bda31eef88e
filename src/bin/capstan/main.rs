//! Capstan CLI - a package manager and build system for Fortran

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("capstan=debug")
    } else {
        EnvFilter::new("capstan=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::New(args) => commands::new::execute(args).map(|_| 0),
        Commands::Build(args) => commands::build::execute(args, cli.verbose, cli.quiet).map(|_| 0),
        Commands::Run(args) => commands::run::execute(args, cli.verbose, cli.quiet),
        Commands::Test(args) => commands::test::execute(args, cli.verbose, cli.quiet),
        Commands::Clean(args) => commands::clean::execute(args).map(|_| 0),
        Commands::Completions(args) => commands::completions::execute(args).map(|_| 0),
    }
}
