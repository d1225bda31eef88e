//! `capstan run`

use anyhow::Result;

use capstan::ops::run::{run, RunOptions, RunScope};

use crate::cli::RunArgs;
use crate::commands::{build::to_options, find_package_root};

pub fn execute(args: RunArgs, verbose: bool, quiet: bool) -> Result<i32> {
    let root = find_package_root()?;

    let scope = if args.example {
        RunScope::Example
    } else {
        RunScope::App
    };

    let opts = RunOptions {
        build: to_options(&args.build, verbose, quiet),
        names: args.target.into_iter().collect(),
        args: args.args,
        list: args.list,
    };

    run(&root, scope, &opts)
}
