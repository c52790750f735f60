use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use snipcheck::{approval, reporting};
use snipcheck::{
    check_files, discover, CheckerRegistry, SnipcheckConfig, Validator, CONFIG_FILE_NAME,
};
use std::io;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "snipcheck", version, about = "Check code blocks in documentation pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents and check their code blocks
    Check(CheckArgs),
    /// Approve a configuration that runs external commands
    Allow {
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
    },
    /// Revoke the approval of a configuration
    Deny {
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
    },
    /// List approved configurations
    List,
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Files or directories to check
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// Configuration file (defaults to ./snipcheck.toml when present)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Maximum number of documents checked concurrently
    #[arg(long, short)]
    jobs: Option<usize>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Check(args) => handle_check(args),
        Commands::Allow { config } => approval::approve(&config).map(|()| {
            println!("Approved {}", config.display());
            true
        }),
        Commands::Deny { config } => approval::deny(&config).map(|()| {
            println!("Removed approval for {}", config.display());
            true
        }),
        Commands::List => approval::list_approved().map(|approved| {
            for path in approved {
                println!("{}", path);
            }
            true
        }),
    };

    match result {
        Ok(true) => {}
        Ok(false) => exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit(1);
        }
    }
}

/// Resolves the configuration: an explicit path must exist, the default
/// file is optional.
fn load_config(explicit: Option<&Path>) -> Result<(SnipcheckConfig, Option<PathBuf>)> {
    match explicit {
        Some(path) => Ok((SnipcheckConfig::load(path)?, Some(path.to_path_buf()))),
        None => {
            let default = PathBuf::from(CONFIG_FILE_NAME);
            if default.is_file() {
                Ok((SnipcheckConfig::load(&default)?, Some(default)))
            } else {
                log::debug!("No {} found, using built-in checkers", CONFIG_FILE_NAME);
                Ok((SnipcheckConfig::default(), None))
            }
        }
    }
}

/// Returns whether every document loaded and every checked block passed.
fn handle_check(args: CheckArgs) -> Result<bool> {
    let (config, config_path) = load_config(args.config.as_deref())?;

    if config.has_commands() {
        if let Some(path) = &config_path {
            if !approval::is_approved(path)? {
                reporting::report_approval_error(path);
                anyhow::bail!("configuration not approved");
            }
        }
    }

    let files = discover(&args.paths, &config.check.extensions)?;
    let jobs = args.jobs.unwrap_or_else(|| config.jobs()).max(1);
    let validator = Arc::new(Validator::new(CheckerRegistry::from_config(&config)));
    if validator.registry().is_empty() {
        log::warn!("No checkers are enabled, every code block will be skipped");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("Failed to start runtime")?;
    let summary = runtime.block_on(check_files(files, validator, jobs))?;

    match args.format {
        Format::Json => reporting::write_json(&summary, io::stdout().lock())?,
        Format::Text => {
            for doc in &summary.documents {
                match &doc.outcome {
                    Ok(report) => report.failures().for_each(reporting::report_syntax_error),
                    Err(err) => reporting::report_load_error(err),
                }
            }
            reporting::print_summary(&summary);
        }
    }

    Ok(summary.is_success())
}
