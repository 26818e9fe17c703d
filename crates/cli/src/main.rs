// cartons CLI - carton inventory runs and carton catalog checks

mod catalog;
mod exit_codes;
mod export;
mod inventory;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use exit_codes::{EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "cartons")]
#[command(about = "Carton target inventory: match, fill placeholder magnitudes, flag outliers")]
#[command(version)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every carton named in a TOML config
    #[command(after_help = "\
Examples:
  cartons run inventory.toml
  cartons run inventory.toml --json
  cartons run inventory.toml --output run.json --csv cartons.csv
  cartons run inventory.toml --visualize --strict")]
    Run {
        /// Path to the inventory .toml config file
        config: PathBuf,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file (overrides [output].json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write per-carton summary CSV to file (overrides [output].csv)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Print the boxed per-carton report
        #[arg(long)]
        visualize: bool,

        /// Exit non-zero when any outlier or ambiguous match is recorded
        #[arg(long)]
        strict: bool,
    },

    /// Resolve every configured carton without processing data
    #[command(after_help = "\
Examples:
  cartons validate inventory.toml")]
    Validate {
        /// Path to the inventory .toml config file
        config: PathBuf,
    },

    /// Check a carton list file against the carton catalog
    #[command(after_help = "\
Examples:
  cartons check rsconfig_cartons.txt --catalog catalog.csv
  cartons check rsconfig_cartons.txt --catalog catalog.csv --json")]
    Check {
        /// `|`-delimited carton list (carton | plan | category | stage | active)
        list: PathBuf,

        /// Carton catalog CSV
        #[arg(long)]
        catalog: PathBuf,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Select carton versions from the catalog and print or write a list file
    #[command(after_help = "\
Examples:
  cartons select --catalog catalog.csv --pattern 'bhm_rm_*'
  cartons select --catalog catalog.csv --versions single --version 83
  cartons select --catalog catalog.csv --force bhm_rm_core=83 --write cartons.txt")]
    Select {
        /// Carton catalog CSV
        #[arg(long)]
        catalog: PathBuf,

        /// Case-insensitive carton name glob, e.g. 'bhm_rm_*' (default: every carton)
        #[arg(long)]
        pattern: Option<String>,

        /// Which versions to keep per carton name
        #[arg(long, value_enum, default_value = "latest")]
        versions: Versions,

        /// version_pk to keep with --versions single
        #[arg(long)]
        version: Option<i64>,

        /// Force a version for one carton, NAME=PK. Repeatable.
        #[arg(long, value_name = "NAME=PK")]
        force: Vec<String>,

        /// Write the selection as a list file instead of stdout
        #[arg(long)]
        write: Option<PathBuf>,

        /// Replace an existing --write file
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Versions {
    Latest,
    All,
    Single,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, output, csv, visualize, strict } => {
            inventory::cmd_run(inventory::RunArgs { config, json, output, csv, visualize, strict })
        }
        Commands::Validate { config } => inventory::cmd_validate(config),
        Commands::Check { list, catalog, json } => catalog::cmd_check(list, catalog, json),
        Commands::Select { catalog, pattern, versions, version, force, write, overwrite } => {
            catalog::cmd_select(catalog::SelectArgs {
                catalog,
                pattern,
                versions,
                version,
                force,
                write,
                overwrite,
            })
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(EXIT_INVALID_CONFIG, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_RUNTIME, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
