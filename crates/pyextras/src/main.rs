//! The `pyextras` binary: the directive surface as a command line, for use
//! from documentation build pipelines.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use anstream::eprintln;
use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;

use pyextras::{directive, Config, ExtraRequest};
use pyextras_sources::{Context, Options};

use crate::logging::{setup_logging, Level};

mod logging;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// The name of the extra to render the notice for.
    extra: String,

    /// Location of the package root, relative to the directory containing
    /// the documentation source directory.
    #[arg(long, value_name = "PATH")]
    package_root: Option<PathBuf>,

    /// The documentation source directory.
    #[arg(long, value_name = "DIR", default_value = "docs")]
    docs_dir: PathBuf,

    /// Display name for the package in the install command. Defaults to the
    /// name declared in pyproject.toml.
    #[arg(long, value_name = "NAME")]
    name: Option<String>,

    /// The noun that "has" the requirements in the notice, e.g. "class".
    #[arg(long, value_name = "SCOPE")]
    scope: Option<String>,

    /// Read the requirements from this file, relative to the package root.
    #[arg(long, value_name = "PATH")]
    file: Option<String>,

    /// Read the requirements from the extras_require mapping in __pkginfo__.py.
    #[arg(long = "pkginfo")]
    pkginfo: bool,

    /// Read the requirements from the [options.extras_require] section of setup.cfg.
    #[arg(long = "setup-cfg")]
    setup_cfg: bool,

    /// Read the requirements from [tool.flit.metadata.requires-extra] in pyproject.toml.
    #[arg(long)]
    flit: bool,

    /// Read the requirements from [project.optional-dependencies] in pyproject.toml.
    #[arg(long)]
    pyproject: bool,

    /// Use this requirement as-is; may be repeated. The sources above and
    /// inline requirements are mutually exclusive.
    #[arg(short = 'r', long = "requirement", value_name = "SPEC")]
    requirements: Vec<String>,

    /// Suppress everything except the rendered notice.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show debug output.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// The raw option map of the equivalent directive invocation. Source
    /// exclusivity is deliberately left to the resolver rather than encoded
    /// as clap conflicts, so every surface reports it the same way.
    fn options(&self) -> Options {
        let mut options = Options::new();
        if let Some(file) = &self.file {
            options.insert("file".to_string(), file.clone());
        }
        if self.pkginfo {
            options.insert("__pkginfo__".to_string(), String::new());
        }
        if self.setup_cfg {
            options.insert("setup.cfg".to_string(), String::new());
        }
        if self.flit {
            options.insert("flit".to_string(), String::new());
        }
        if self.pyproject {
            options.insert("pyproject".to_string(), String::new());
        }
        options
    }
}

#[derive(Copy, Clone)]
enum ExitStatus {
    /// The notice was rendered, or there was legitimately nothing to render.
    Success,
    /// The invocation or the metadata was at fault.
    Error,
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => Self::from(0),
            ExitStatus::Error => Self::from(2),
        }
    }
}

fn run(cli: &Cli) -> Result<ExitStatus> {
    let config = Config {
        package_root: cli.package_root.clone(),
        project: cli.name.clone(),
    };
    let context = Context::new(&cli.docs_dir);
    let options = cli.options();
    let request = ExtraRequest {
        extra: &cli.extra,
        scope: cli.scope.as_deref(),
        options: &options,
        content: &cli.requirements,
    };
    match directive::render(&request, &config, &context)? {
        Some(notice) => {
            print!("{notice}");
            Ok(ExitStatus::Success)
        }
        // The "no requirements" warning has already gone through tracing.
        None => Ok(ExitStatus::Success),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(if cli.verbose {
        Level::Verbose
    } else if cli.quiet {
        Level::Quiet
    } else {
        Level::Default
    });
    match run(&cli) {
        Ok(status) => status.into(),
        Err(err) => {
            eprintln!("{}{} {err}", "error".red().bold(), ":".bold());
            for cause in err.chain().skip(1) {
                eprintln!("  {}{} {cause}", "Caused by".red().bold(), ":".bold());
            }
            ExitStatus::Error.into()
        }
    }
}
