//! Toolchain abstraction for Fortran/C/C++ compilers and the archiver.
//!
//! Each vendor implementation knows how to generate command lines for its
//! compiler family: compile and link invocations, module-output and
//! include flags, language feature flags, and profile defaults. The
//! vendor is identified once, at build-model construction, by probing the
//! compiler with version flags.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::core::manifest::SourceForm;
use crate::util::process::{find_archiver, find_c_compiler, find_cxx_compiler, CommandRunner};

/// Compiler vendor, as reported by version probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerVendor {
    Gcc,
    IntelClassic,
    IntelLlvm,
    Nvhpc,
    Nag,
    LFortran,
    FlangLlvm,
    IbmXl,
    Cray,
    Unknown,
}

impl CompilerVendor {
    /// Short vendor tag used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerVendor::Gcc => "gcc",
            CompilerVendor::IntelClassic => "intel-classic",
            CompilerVendor::IntelLlvm => "intel-llvm",
            CompilerVendor::Nvhpc => "nvhpc",
            CompilerVendor::Nag => "nag",
            CompilerVendor::LFortran => "lfortran",
            CompilerVendor::FlangLlvm => "flang",
            CompilerVendor::IbmXl => "ibm-xl",
            CompilerVendor::Cray => "cray",
            CompilerVendor::Unknown => "unknown",
        }
    }
}

/// Build profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    Debug,
    Release,
}

impl Profile {
    /// Directory component under the build prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Debug => "debug",
            Profile::Release => "release",
        }
    }
}

impl std::str::FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Profile::Debug),
            "release" => Ok(Profile::Release),
            _ => Err(format!("unknown profile `{}`; expected debug or release", s)),
        }
    }
}

/// Fortran language feature toggles translated to vendor flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FortranFeature {
    /// Forbid implicit typing
    NoImplicitTyping,
    /// Warn on implicit external interfaces
    NoImplicitExternal,
    /// Force free-form source
    FreeForm,
    /// Force fixed-form source
    FixedForm,
    /// The main program is not Fortran; suppress the Fortran entry point
    NoFortranMain,
}

impl FortranFeature {
    /// Feature flags for a package's feature settings.
    pub fn for_features(
        implicit_typing: bool,
        implicit_external: bool,
        source_form: SourceForm,
    ) -> Vec<FortranFeature> {
        let mut features = Vec::new();
        if !implicit_typing {
            features.push(FortranFeature::NoImplicitTyping);
        }
        if !implicit_external {
            features.push(FortranFeature::NoImplicitExternal);
        }
        match source_form {
            SourceForm::Free => features.push(FortranFeature::FreeForm),
            SourceForm::Fixed => features.push(FortranFeature::FixedForm),
            SourceForm::Default => {}
        }
        features
    }
}

/// A command to execute: program plus arguments.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The program to run
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }

    /// Flat token list beginning with the program, as recorded in
    /// `compile_commands.json`.
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens = Vec::with_capacity(self.args.len() + 1);
        tokens.push(self.program.display().to_string());
        tokens.extend(self.args.iter().cloned());
        tokens
    }
}

/// Trait for toolchain implementations.
///
/// Implementations generate command lines; the executor owns running them
/// and capturing logs.
pub trait Toolchain: Send + Sync {
    /// The identified vendor.
    fn vendor(&self) -> CompilerVendor;

    /// Path to the Fortran compiler.
    fn fortran_compiler(&self) -> &Path;

    /// Path to the C compiler.
    fn c_compiler(&self) -> &Path;

    /// Path to the C++ compiler.
    fn cxx_compiler(&self) -> &Path;

    /// Compile one Fortran source to an object.
    fn compile_fortran_command(&self, src: &Path, out: &Path, flags: &[String]) -> CommandSpec {
        CommandSpec::new(self.fortran_compiler())
            .arg("-c")
            .args(flags.iter().cloned())
            .arg(src.display().to_string())
            .arg("-o")
            .arg(out.display().to_string())
    }

    /// Compile one C source to an object.
    fn compile_c_command(&self, src: &Path, out: &Path, flags: &[String]) -> CommandSpec {
        CommandSpec::new(self.c_compiler())
            .arg("-c")
            .args(flags.iter().cloned())
            .arg(src.display().to_string())
            .arg("-o")
            .arg(out.display().to_string())
    }

    /// Compile one C++ source to an object.
    fn compile_cpp_command(&self, src: &Path, out: &Path, flags: &[String]) -> CommandSpec {
        CommandSpec::new(self.cxx_compiler())
            .arg("-c")
            .args(flags.iter().cloned())
            .arg(src.display().to_string())
            .arg("-o")
            .arg(out.display().to_string())
    }

    /// Link objects and archives into an executable.
    ///
    /// Inputs appear on the command line in the given order; archives must
    /// already be in link order.
    fn link_executable_command(
        &self,
        inputs: &[PathBuf],
        out: &Path,
        flags: &[String],
    ) -> CommandSpec {
        CommandSpec::new(self.fortran_compiler())
            .args(inputs.iter().map(|p| p.display().to_string()))
            .args(flags.iter().cloned())
            .arg("-o")
            .arg(out.display().to_string())
    }

    /// Link objects into a shared library.
    fn link_shared_command(&self, inputs: &[PathBuf], out: &Path, flags: &[String]) -> CommandSpec {
        CommandSpec::new(self.fortran_compiler())
            .arg("-shared")
            .arg("-fPIC")
            .args(inputs.iter().map(|p| p.display().to_string()))
            .args(flags.iter().cloned())
            .arg("-o")
            .arg(out.display().to_string())
    }

    /// Flag tokens directing compiled module files into `dir`.
    fn module_output_flag(&self, dir: &Path) -> Vec<String>;

    /// Flag tokens adding `dir` to the include/module search path.
    fn include_flag(&self, dir: &Path) -> Vec<String> {
        vec![format!("-I{}", dir.display())]
    }

    /// Flag tokens enabling a language feature.
    fn feature_flag(&self, feature: FortranFeature) -> Vec<String>;

    /// Default Fortran flags for a profile.
    fn default_flags(&self, profile: Profile) -> Vec<String>;

    /// Whether this is a GNU compiler.
    fn is_gnu(&self) -> bool {
        self.vendor() == CompilerVendor::Gcc
    }

    /// Whether this is an Intel compiler (classic or LLVM).
    fn is_intel(&self) -> bool {
        matches!(
            self.vendor(),
            CompilerVendor::IntelClassic | CompilerVendor::IntelLlvm
        )
    }
}

/// Probe whether the compiler accepts the given flags by compiling an
/// empty program.
pub fn check_flags_supported(
    toolchain: &dyn Toolchain,
    runner: &dyn CommandRunner,
    flags: &[String],
) -> bool {
    let scratch = std::env::temp_dir().join(format!(
        "capstan-probe-{}-{}",
        std::process::id(),
        flags.len()
    ));
    if std::fs::create_dir_all(&scratch).is_err() {
        return false;
    }

    let src = scratch.join("probe.f90");
    let out = scratch.join("probe.o");
    if std::fs::write(&src, "end\n").is_err() {
        return false;
    }

    let spec = toolchain.compile_fortran_command(&src, &out, flags);
    let supported = runner
        .run_captured(&spec.program, &spec.args)
        .map(|o| o.success())
        .unwrap_or(false);

    let _ = std::fs::remove_dir_all(&scratch);
    supported
}

/// GNU toolchain: gfortran with gcc/g++ companions.
#[derive(Debug, Clone)]
pub struct GnuToolchain {
    /// Path to gfortran
    pub fc: PathBuf,
    /// Path to the C compiler
    pub cc: PathBuf,
    /// Path to the C++ compiler
    pub cxx: PathBuf,
}

impl Toolchain for GnuToolchain {
    fn vendor(&self) -> CompilerVendor {
        CompilerVendor::Gcc
    }

    fn fortran_compiler(&self) -> &Path {
        &self.fc
    }

    fn c_compiler(&self) -> &Path {
        &self.cc
    }

    fn cxx_compiler(&self) -> &Path {
        &self.cxx
    }

    fn module_output_flag(&self, dir: &Path) -> Vec<String> {
        vec!["-J".to_string(), dir.display().to_string()]
    }

    fn feature_flag(&self, feature: FortranFeature) -> Vec<String> {
        match feature {
            FortranFeature::NoImplicitTyping => vec!["-fimplicit-none".to_string()],
            FortranFeature::NoImplicitExternal => vec!["-Wimplicit-interface".to_string()],
            FortranFeature::FreeForm => vec!["-ffree-form".to_string()],
            FortranFeature::FixedForm => vec!["-ffixed-form".to_string()],
            FortranFeature::NoFortranMain => Vec::new(),
        }
    }

    fn default_flags(&self, profile: Profile) -> Vec<String> {
        match profile {
            Profile::Debug => [
                "-Wall",
                "-Wextra",
                "-fcheck=bounds,array-temps",
                "-fbacktrace",
                "-g",
            ]
            .map(String::from)
            .to_vec(),
            Profile::Release => ["-O3", "-funroll-loops"].map(String::from).to_vec(),
        }
    }
}

/// Intel toolchain: ifort (classic) or ifx (LLVM).
#[derive(Debug, Clone)]
pub struct IntelToolchain {
    pub fc: PathBuf,
    pub cc: PathBuf,
    pub cxx: PathBuf,
    /// Classic (ifort) rather than LLVM (ifx)
    pub classic: bool,
}

impl Toolchain for IntelToolchain {
    fn vendor(&self) -> CompilerVendor {
        if self.classic {
            CompilerVendor::IntelClassic
        } else {
            CompilerVendor::IntelLlvm
        }
    }

    fn fortran_compiler(&self) -> &Path {
        &self.fc
    }

    fn c_compiler(&self) -> &Path {
        &self.cc
    }

    fn cxx_compiler(&self) -> &Path {
        &self.cxx
    }

    fn module_output_flag(&self, dir: &Path) -> Vec<String> {
        vec!["-module".to_string(), dir.display().to_string()]
    }

    fn feature_flag(&self, feature: FortranFeature) -> Vec<String> {
        match feature {
            FortranFeature::NoImplicitTyping => vec!["-implicitnone".to_string()],
            FortranFeature::NoImplicitExternal => vec!["-warn".to_string(), "interfaces".to_string()],
            FortranFeature::FreeForm => vec!["-free".to_string()],
            FortranFeature::FixedForm => vec!["-fixed".to_string()],
            FortranFeature::NoFortranMain => vec!["-nofor-main".to_string()],
        }
    }

    fn default_flags(&self, profile: Profile) -> Vec<String> {
        match profile {
            Profile::Debug => ["-warn", "all", "-check", "all", "-traceback", "-g", "-O0"]
                .map(String::from)
                .to_vec(),
            Profile::Release => ["-O3"].map(String::from).to_vec(),
        }
    }
}

/// LLVM Flang or LFortran toolchain.
#[derive(Debug, Clone)]
pub struct FlangToolchain {
    pub fc: PathBuf,
    pub cc: PathBuf,
    pub cxx: PathBuf,
    /// LFortran rather than LLVM flang
    pub lfortran: bool,
}

impl Toolchain for FlangToolchain {
    fn vendor(&self) -> CompilerVendor {
        if self.lfortran {
            CompilerVendor::LFortran
        } else {
            CompilerVendor::FlangLlvm
        }
    }

    fn fortran_compiler(&self) -> &Path {
        &self.fc
    }

    fn c_compiler(&self) -> &Path {
        &self.cc
    }

    fn cxx_compiler(&self) -> &Path {
        &self.cxx
    }

    fn module_output_flag(&self, dir: &Path) -> Vec<String> {
        if self.lfortran {
            vec!["-J".to_string(), dir.display().to_string()]
        } else {
            vec!["-module-dir".to_string(), dir.display().to_string()]
        }
    }

    fn feature_flag(&self, feature: FortranFeature) -> Vec<String> {
        match feature {
            FortranFeature::NoImplicitTyping if self.lfortran => {
                vec!["--implicit-typing".to_string()]
            }
            FortranFeature::FreeForm if !self.lfortran => vec!["-ffree-form".to_string()],
            FortranFeature::FixedForm if !self.lfortran => vec!["-ffixed-form".to_string()],
            _ => Vec::new(),
        }
    }

    fn default_flags(&self, profile: Profile) -> Vec<String> {
        match profile {
            Profile::Debug => ["-g"].map(String::from).to_vec(),
            Profile::Release => ["-O3"].map(String::from).to_vec(),
        }
    }
}

/// NVIDIA HPC (formerly PGI) toolchain.
#[derive(Debug, Clone)]
pub struct NvhpcToolchain {
    pub fc: PathBuf,
    pub cc: PathBuf,
    pub cxx: PathBuf,
}

impl Toolchain for NvhpcToolchain {
    fn vendor(&self) -> CompilerVendor {
        CompilerVendor::Nvhpc
    }

    fn fortran_compiler(&self) -> &Path {
        &self.fc
    }

    fn c_compiler(&self) -> &Path {
        &self.cc
    }

    fn cxx_compiler(&self) -> &Path {
        &self.cxx
    }

    fn module_output_flag(&self, dir: &Path) -> Vec<String> {
        vec!["-module".to_string(), dir.display().to_string()]
    }

    fn feature_flag(&self, feature: FortranFeature) -> Vec<String> {
        match feature {
            FortranFeature::NoImplicitTyping => vec!["-Mdclchk".to_string()],
            FortranFeature::FreeForm => vec!["-Mfree".to_string()],
            FortranFeature::FixedForm => vec!["-Mfixed".to_string()],
            FortranFeature::NoFortranMain => vec!["-Mnomain".to_string()],
            FortranFeature::NoImplicitExternal => Vec::new(),
        }
    }

    fn default_flags(&self, profile: Profile) -> Vec<String> {
        match profile {
            Profile::Debug => ["-g", "-Mbounds", "-Mbackslash"].map(String::from).to_vec(),
            Profile::Release => ["-fast"].map(String::from).to_vec(),
        }
    }
}

/// NAG Fortran toolchain.
#[derive(Debug, Clone)]
pub struct NagToolchain {
    pub fc: PathBuf,
    pub cc: PathBuf,
    pub cxx: PathBuf,
}

impl Toolchain for NagToolchain {
    fn vendor(&self) -> CompilerVendor {
        CompilerVendor::Nag
    }

    fn fortran_compiler(&self) -> &Path {
        &self.fc
    }

    fn c_compiler(&self) -> &Path {
        &self.cc
    }

    fn cxx_compiler(&self) -> &Path {
        &self.cxx
    }

    fn module_output_flag(&self, dir: &Path) -> Vec<String> {
        vec!["-mdir".to_string(), dir.display().to_string()]
    }

    fn feature_flag(&self, feature: FortranFeature) -> Vec<String> {
        match feature {
            FortranFeature::NoImplicitTyping => vec!["-u".to_string()],
            FortranFeature::FreeForm => vec!["-free".to_string()],
            FortranFeature::FixedForm => vec!["-fixed".to_string()],
            _ => Vec::new(),
        }
    }

    fn default_flags(&self, profile: Profile) -> Vec<String> {
        match profile {
            Profile::Debug => ["-g", "-C=all"].map(String::from).to_vec(),
            Profile::Release => ["-O4"].map(String::from).to_vec(),
        }
    }
}

/// Fallback toolchain for vendors without dedicated flag tables
/// (IBM XL, Cray, unidentified compilers).
#[derive(Debug, Clone)]
pub struct GenericToolchain {
    pub fc: PathBuf,
    pub cc: PathBuf,
    pub cxx: PathBuf,
    pub vendor: CompilerVendor,
}

impl Toolchain for GenericToolchain {
    fn vendor(&self) -> CompilerVendor {
        self.vendor
    }

    fn fortran_compiler(&self) -> &Path {
        &self.fc
    }

    fn c_compiler(&self) -> &Path {
        &self.cc
    }

    fn cxx_compiler(&self) -> &Path {
        &self.cxx
    }

    fn module_output_flag(&self, dir: &Path) -> Vec<String> {
        match self.vendor {
            CompilerVendor::IbmXl => vec![format!("-qmoddir={}", dir.display())],
            CompilerVendor::Cray => vec!["-J".to_string(), dir.display().to_string()],
            _ => vec!["-module".to_string(), dir.display().to_string()],
        }
    }

    fn feature_flag(&self, feature: FortranFeature) -> Vec<String> {
        match (self.vendor, feature) {
            (CompilerVendor::IbmXl, FortranFeature::FreeForm) => {
                vec!["-qfree".to_string()]
            }
            (CompilerVendor::IbmXl, FortranFeature::FixedForm) => {
                vec!["-qfixed".to_string()]
            }
            (CompilerVendor::Cray, FortranFeature::FreeForm) => vec!["-ffree".to_string()],
            (CompilerVendor::Cray, FortranFeature::FixedForm) => vec!["-ffixed".to_string()],
            _ => Vec::new(),
        }
    }

    fn default_flags(&self, profile: Profile) -> Vec<String> {
        match profile {
            Profile::Debug => ["-g"].map(String::from).to_vec(),
            Profile::Release => ["-O2"].map(String::from).to_vec(),
        }
    }
}

/// Identify a compiler vendor by invoking it with version flags and
/// matching the output.
pub fn identify(compiler: &Path, runner: &dyn CommandRunner) -> CompilerVendor {
    for flag in ["--version", "-V", "-version"] {
        let Ok(output) = runner.run_captured(compiler, &[flag.to_string()]) else {
            continue;
        };
        let text = format!("{}\n{}", output.stdout, output.stderr);
        if let Some(vendor) = match_vendor(&text) {
            return vendor;
        }
    }

    // Fall back to the executable name.
    let name = compiler
        .file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match name.as_str() {
        "gfortran" => CompilerVendor::Gcc,
        "ifort" => CompilerVendor::IntelClassic,
        "ifx" => CompilerVendor::IntelLlvm,
        "nvfortran" | "pgfortran" => CompilerVendor::Nvhpc,
        "nagfor" => CompilerVendor::Nag,
        "lfortran" => CompilerVendor::LFortran,
        "flang" | "flang-new" => CompilerVendor::FlangLlvm,
        "xlf" | "xlf90" => CompilerVendor::IbmXl,
        "ftn" | "crayftn" => CompilerVendor::Cray,
        _ => CompilerVendor::Unknown,
    }
}

/// Match version-probe output to a vendor.
fn match_vendor(text: &str) -> Option<CompilerVendor> {
    if text.contains("GNU Fortran") {
        Some(CompilerVendor::Gcc)
    } else if text.contains("ifx") || text.contains("Intel(R) Fortran Compiler") {
        Some(CompilerVendor::IntelLlvm)
    } else if text.contains("ifort")
        || text.contains("Intel(R) Fortran Intel(R) 64 Compiler Classic")
    {
        Some(CompilerVendor::IntelClassic)
    } else if text.contains("nvfortran") || text.contains("PGI") {
        Some(CompilerVendor::Nvhpc)
    } else if text.contains("NAG Fortran") {
        Some(CompilerVendor::Nag)
    } else if text.contains("LFortran") {
        Some(CompilerVendor::LFortran)
    } else if text.contains("flang") {
        Some(CompilerVendor::FlangLlvm)
    } else if text.contains("IBM XL Fortran") {
        Some(CompilerVendor::IbmXl)
    } else if text.contains("Cray Fortran") {
        Some(CompilerVendor::Cray)
    } else {
        None
    }
}

/// Build the vendor-appropriate toolchain for a Fortran compiler path.
pub fn toolchain_for(fc: PathBuf, runner: &dyn CommandRunner) -> Arc<dyn Toolchain> {
    let vendor = identify(&fc, runner);
    let cc = companion_c_compiler(&fc, vendor);
    let cxx = companion_cxx_compiler(&fc, vendor);

    tracing::debug!(
        "identified `{}` as {} toolchain",
        fc.display(),
        vendor.as_str()
    );

    match vendor {
        CompilerVendor::Gcc => Arc::new(GnuToolchain { fc, cc, cxx }),
        CompilerVendor::IntelClassic => Arc::new(IntelToolchain {
            fc,
            cc,
            cxx,
            classic: true,
        }),
        CompilerVendor::IntelLlvm => Arc::new(IntelToolchain {
            fc,
            cc,
            cxx,
            classic: false,
        }),
        CompilerVendor::FlangLlvm => Arc::new(FlangToolchain {
            fc,
            cc,
            cxx,
            lfortran: false,
        }),
        CompilerVendor::LFortran => Arc::new(FlangToolchain {
            fc,
            cc,
            cxx,
            lfortran: true,
        }),
        CompilerVendor::Nvhpc => Arc::new(NvhpcToolchain { fc, cc, cxx }),
        CompilerVendor::Nag => Arc::new(NagToolchain { fc, cc, cxx }),
        vendor => Arc::new(GenericToolchain {
            fc,
            cc,
            cxx,
            vendor,
        }),
    }
}

/// Pick a C compiler matching the Fortran compiler's family.
fn companion_c_compiler(fc: &Path, vendor: CompilerVendor) -> PathBuf {
    let preferred = match vendor {
        CompilerVendor::Gcc => infer_sibling(fc, "gfortran", "gcc"),
        CompilerVendor::IntelClassic => Some(PathBuf::from("icc")),
        CompilerVendor::IntelLlvm => Some(PathBuf::from("icx")),
        CompilerVendor::Nvhpc => Some(PathBuf::from("nvc")),
        CompilerVendor::FlangLlvm | CompilerVendor::LFortran => Some(PathBuf::from("clang")),
        _ => None,
    };

    preferred
        .filter(|p| p.is_absolute() && p.is_file() || which::which(p).is_ok())
        .or_else(find_c_compiler)
        .unwrap_or_else(|| PathBuf::from("cc"))
}

/// Pick a C++ compiler matching the Fortran compiler's family.
fn companion_cxx_compiler(fc: &Path, vendor: CompilerVendor) -> PathBuf {
    let preferred = match vendor {
        CompilerVendor::Gcc => infer_sibling(fc, "gfortran", "g++"),
        CompilerVendor::IntelClassic => Some(PathBuf::from("icpc")),
        CompilerVendor::IntelLlvm => Some(PathBuf::from("icpx")),
        CompilerVendor::Nvhpc => Some(PathBuf::from("nvc++")),
        CompilerVendor::FlangLlvm | CompilerVendor::LFortran => Some(PathBuf::from("clang++")),
        _ => None,
    };

    preferred
        .filter(|p| p.is_absolute() && p.is_file() || which::which(p).is_ok())
        .or_else(find_cxx_compiler)
        .unwrap_or_else(|| PathBuf::from("c++"))
}

/// Derive a sibling tool path, preserving prefixes like
/// `x86_64-linux-gnu-gfortran` -> `x86_64-linux-gnu-gcc`.
fn infer_sibling(fc: &Path, from: &str, to: &str) -> Option<PathBuf> {
    let s = fc.to_string_lossy();
    if s.ends_with(from) {
        Some(PathBuf::from(format!(
            "{}{}",
            &s[..s.len() - from.len()],
            to
        )))
    } else {
        None
    }
}

/// Trait for archiver implementations.
pub trait Archiver: Send + Sync {
    /// Path to the archiver executable.
    fn path(&self) -> &Path;

    /// Whether object lists should be passed via a response file.
    fn use_response_file(&self) -> bool;

    /// Generate the archive command. When `response_file` is set, the
    /// executor has written the object list there, one path per line.
    fn archive_command(
        &self,
        objects: &[PathBuf],
        output: &Path,
        response_file: Option<&Path>,
    ) -> CommandSpec;
}

/// The system `ar` (or `lib.exe` on Windows).
#[derive(Debug, Clone)]
pub struct SystemArchiver {
    /// Archiver executable
    pub ar: PathBuf,
}

impl SystemArchiver {
    /// Locate the system archiver.
    pub fn detect() -> Result<Self> {
        match find_archiver() {
            Some(ar) => Ok(SystemArchiver { ar }),
            None => bail!("no archiver found; install `ar` or set the AR environment variable"),
        }
    }
}

impl Archiver for SystemArchiver {
    fn path(&self) -> &Path {
        &self.ar
    }

    fn use_response_file(&self) -> bool {
        // Command-line length limits only bite on Windows.
        cfg!(windows)
    }

    fn archive_command(
        &self,
        objects: &[PathBuf],
        output: &Path,
        response_file: Option<&Path>,
    ) -> CommandSpec {
        let mut cmd = CommandSpec::new(&self.ar)
            .arg("rcs")
            .arg(output.display().to_string());

        match response_file {
            Some(rsp) => cmd = cmd.arg(format!("@{}", rsp.display())),
            None => {
                cmd = cmd.args(objects.iter().map(|o| o.display().to_string()));
            }
        }

        cmd
    }
}
