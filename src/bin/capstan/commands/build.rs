//! `capstan build`

use anyhow::Result;

use capstan::builder::toolchain::Profile;
use capstan::ops::build::{build, BuildOptions};

use crate::cli::BuildArgs;
use crate::commands::find_package_root;

/// Translate CLI arguments into build options.
pub fn to_options(args: &BuildArgs, verbose: bool, quiet: bool) -> BuildOptions {
    BuildOptions {
        profile: if args.release {
            Profile::Release
        } else {
            args.profile
        },
        jobs: args.jobs,
        dry_run: args.dry_run,
        include_tests: args.tests,
        flags: args.flags.clone(),
        verbose,
        quiet,
    }
}

pub fn execute(args: BuildArgs, verbose: bool, quiet: bool) -> Result<()> {
    let root = find_package_root()?;
    let opts = to_options(&args, verbose, quiet);
    let output = build(&root, &opts)?;

    if !quiet {
        if output.report.executed == 0 {
            println!("nothing to do: {} target(s) up to date", output.report.skipped);
        } else {
            println!(
                "finished: {} target(s) built, {} up to date",
                output.report.executed, output.report.skipped
            );
        }
    }
    Ok(())
}
