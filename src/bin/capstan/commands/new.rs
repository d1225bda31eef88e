//! `capstan new`

use anyhow::Result;

use capstan::ops::new::{new_package, NewOptions};

use crate::cli::NewArgs;

pub fn execute(args: NewArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let opts = NewOptions {
        name: args.name,
        lib: args.lib,
        app: args.app,
    };

    let root = new_package(&cwd, &opts)?;
    println!("created `{}`", root.display());
    Ok(())
}
