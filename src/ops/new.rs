//! Implementation of `capstan new`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::manifest::MANIFEST_FILE;
use crate::util::fs::write_string;

/// Options for scaffolding a package.
#[derive(Debug, Clone, Default)]
pub struct NewOptions {
    /// Package name (also the directory name)
    pub name: String,
    /// Create only the library skeleton
    pub lib: bool,
    /// Create only the application skeleton
    pub app: bool,
}

/// Create a new package directory under `parent`.
pub fn new_package(parent: &Path, opts: &NewOptions) -> Result<PathBuf> {
    validate_name(&opts.name)?;

    let root = parent.join(&opts.name);
    if root.join(MANIFEST_FILE).exists() {
        bail!("destination {} is already a capstan package", root.display());
    }

    let module_name = opts.name.replace('-', "_");
    let with_lib = opts.lib || !opts.app;
    let with_app = opts.app || !opts.lib;

    write_string(&root.join(MANIFEST_FILE), &manifest_template(&opts.name))?;

    if with_lib {
        write_string(
            &root.join("src").join(format!("{}.f90", module_name)),
            &library_template(&module_name),
        )?;
    }

    if with_app {
        write_string(
            &root.join("app").join("main.f90"),
            &program_template(&module_name, with_lib),
        )?;
    }

    tracing::info!("created package `{}` at {}", opts.name, root.display());
    Ok(root)
}

fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars.next().map_or(false, |c| c.is_ascii_alphabetic());
    let valid_rest = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if !valid_start || !valid_rest {
        bail!(
            "invalid package name `{}`: names start with a letter and use letters, digits, `_` or `-`",
            name
        );
    }
    Ok(())
}

fn manifest_template(name: &str) -> String {
    format!(
        "[package]\n\
         name = \"{}\"\n\
         version = \"0.1.0\"\n\
         \n\
         [fortran]\n\
         implicit-typing = false\n\
         implicit-external = false\n\
         source-form = \"free\"\n",
        name
    )
}

fn library_template(module_name: &str) -> String {
    format!(
        "module {name}\n\
         implicit none\n\
         private\n\
         \n\
         public :: say_hello\n\
         contains\n\
         subroutine say_hello\n\
         print *, \"Hello, {name}!\"\n\
         end subroutine say_hello\n\
         end module {name}\n",
        name = module_name
    )
}

fn program_template(module_name: &str, with_lib: bool) -> String {
    if with_lib {
        format!(
            "program main\n\
             use {name}, only: say_hello\n\
             implicit none\n\
             \n\
             call say_hello\n\
             end program main\n",
            name = module_name
        )
    } else {
        "program main\n\
         implicit none\n\
         \n\
         print *, \"Hello, world!\"\n\
         end program main\n"
            .to_string()
    }
}
