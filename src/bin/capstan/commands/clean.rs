//! `capstan clean`

use anyhow::Result;

use capstan::ops::clean::clean;

use crate::cli::CleanArgs;
use crate::commands::find_package_root;

pub fn execute(_args: CleanArgs) -> Result<()> {
    let root = find_package_root()?;
    clean(&root)
}
