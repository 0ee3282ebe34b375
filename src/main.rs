mod cli;
mod config;
mod convert;
mod error;
mod hashes;
mod paths;
mod sarif;
mod scarf;
mod shell;
mod summary;
mod types;
mod xml;

use crate::convert::{ConvertOptions, EnvironmentPolicy, ProcessInfo};
use crate::error::ConvertError;
use crate::hashes::DuplicatePolicy;
use crate::sarif::ExternalSections;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
}

fn init_logging(cli: &cli::Cli) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<i32, ConvertError> {
    let cli = cli::Cli::parse();
    init_logging(&cli);
    let process = ProcessInfo::capture()?;

    let loaded = config::load_config(cli.config.as_deref())?;
    debug!(?loaded, "effective configuration");

    let pretty = match (cli.compact, cli.pretty) {
        (true, _) => false,
        (_, true) => true,
        _ => loaded.output.pretty,
    };
    let hash_duplicates = match cli.hash_duplicates {
        Some(cli::HashDuplicates::Reject) => DuplicatePolicy::Reject,
        Some(cli::HashDuplicates::Overwrite) => DuplicatePolicy::Overwrite,
        None => loaded.hashes.duplicates,
    };
    let external = match cli.external.as_deref() {
        Some(sections) => ExternalSections::parse(sections)?,
        None => ExternalSections::default(),
    };
    let environment = if cli.reduced_env {
        EnvironmentPolicy::AllowList(loaded.environment.allow_list())
    } else {
        EnvironmentPolicy::Full
    };

    let options = ConvertOptions {
        scarf: cli.input,
        summary: cli.summary,
        hashes: cli.hashes,
        build_dir: cli.build_dir,
        output: cli.output,
        external,
        pretty,
        failed: cli.failed,
        environment,
        hash_duplicates,
        hash_algorithm: loaded.hashes.algorithm,
    };
    let report = convert::convert(&options, &process)?;
    if !cli.quiet {
        eprintln!(
            "wrote {} ({} results, {} invocations)",
            report.output.display(),
            report.results,
            report.invocations
        );
        if let Some(sidecar) = &report.sidecar {
            eprintln!("wrote {}", sidecar.display());
        }
    }
    Ok(exit_code::SUCCESS)
}

fn main() {
    match run() {
        Ok(code) => {
            if code != 0 {
                std::process::exit(code);
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(exit_code::FAILURE);
        }
    }
}
