//! ControlD sync CLI entrypoint.
//!
//! Loads and validates the configuration, performs one sync run, and
//! prints the report.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use controld_sync::cli::{Cli, OutputFormat, OutputFormatter};
use controld_sync::config::{ConfigParser, ConfigValidator, SyncConfig, find_config_file};
use controld_sync::controld::ControlDClient;
use controld_sync::error::Result;
use controld_sync::sync::{SyncReport, Synchronizer};
use controld_sync::tailscale::TailscaleClient;

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Log target of this crate.
const CRATE_TARGET: &str = "controld_sync";

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    init_logging(cli.debug, cli.quiet);

    let formatter = OutputFormatter::new(cli.output);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli)) {
        Ok(report) => {
            print_report(&formatter, cli.output, &report);
            if report.execution.has_auth_failure() {
                eprintln!("Authentication failed for at least one operation");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` replaces the flag-derived filter, but `--quiet` still holds
/// this crate at `warn` on top of it.
fn init_logging(debug: bool, quiet: bool) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directives = match rust_log.as_deref().map(str::trim) {
        Some(env) if !env.is_empty() => env_directives(env, quiet),
        _ => log_directives(debug, quiet),
    };

    let filter = EnvFilter::try_new(&directives)
        .unwrap_or_else(|_| EnvFilter::new(log_directives(debug, quiet)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_writer(std::io::stderr)
        .init();
}

/// Filter directives derived from the flags alone.
///
/// `--quiet` wins over `--debug` for this crate; transport logging stays on
/// if both are given.
fn log_directives(debug: bool, quiet: bool) -> String {
    let level = if quiet {
        "warn"
    } else if debug {
        "debug"
    } else {
        "info"
    };

    let mut directives = format!("warn,{CRATE_TARGET}={level}");
    if debug {
        directives.push_str(",reqwest=debug");
    }
    directives
}

/// Filter directives when `RUST_LOG` is set.
fn env_directives(env: &str, quiet: bool) -> String {
    if quiet {
        format!("{env},{CRATE_TARGET}=warn")
    } else {
        env.to_string()
    }
}

/// Main async entry point.
async fn run(cli: &Cli) -> Result<SyncReport> {
    let config = load_config(cli.config.as_deref())?;

    let tailscale = TailscaleClient::new(config.tailscale.api_key()?, &config.tailscale.tailnet)?;
    let controld = ControlDClient::new(config.controld.api_token()?, &config.controld.profile_id)?;

    if cli.apply {
        info!("Running in apply mode");
    } else {
        info!("Running in dry-run mode, no changes will be made");
    }

    Synchronizer::new(&config, &tailscale, &controld)
        .run(cli.apply)
        .await
}

/// Loads, overrides, and validates the configuration. No network call is
/// made before this succeeds.
fn load_config(explicit: Option<&Path>) -> Result<SyncConfig> {
    let config_file = resolve_config_path(explicit)?;
    info!("Using configuration: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(
        config_file
            .parent()
            .unwrap_or_else(|| Path::new(".")),
    );
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }
    debug!("Configuration: {config:?}");

    Ok(config)
}

/// Resolves the configuration file path.
fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let cwd = std::env::current_dir()?;
    find_config_file(cwd)
}

/// Prints the report: JSON to stdout, text to stderr.
fn print_report(formatter: &OutputFormatter, format: OutputFormat, report: &SyncReport) {
    let output = formatter.format_report(report);
    match format {
        OutputFormat::Json => println!("{output}"),
        OutputFormat::Text => eprintln!("{output}"),
    }
}
