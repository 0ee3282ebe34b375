use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "scarf-to-sarif",
    version,
    about = "Convert SCARF static-analysis reports into SARIF 2.1.0 logs"
)]
pub struct Cli {
    /// SCARF report to convert (omitted with --failed)
    pub input: Option<PathBuf>,

    /// SARIF file to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// assessment-summary.xml describing the commands that were run
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Checksum list (`<hash> <path>` per line) for artifact hashes
    #[arg(long)]
    pub hashes: Option<PathBuf>,

    /// Build root directory, overriding the report's build_root_dir
    #[arg(long)]
    pub build_dir: Option<String>,

    /// Comma separated sections to move into an external property file
    /// (results, invocations, artifacts, conversion)
    #[arg(long, value_name = "SECTIONS")]
    pub external: Option<String>,

    /// Write compact single-line JSON
    #[arg(long, conflicts_with = "pretty")]
    pub compact: bool,

    /// Write indented JSON (default unless the config says otherwise)
    #[arg(long)]
    pub pretty: bool,

    /// Only record allow-listed environment variables in the conversion
    #[arg(long)]
    pub reduced_env: bool,

    /// Record a failed assessment from the summary alone
    #[arg(long)]
    pub failed: bool,

    /// What to do when the checksum list names a path twice
    #[arg(long, value_enum)]
    pub hash_duplicates: Option<HashDuplicates>,

    /// Extra TOML config file layered over the global one
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum HashDuplicates {
    Reject,
    Overwrite,
}

impl Cli {
    /// Tracing filter implied by `-v`/`-q` when RUST_LOG is unset.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}
