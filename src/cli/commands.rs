//! CLI argument definitions.
//!
//! The tool has a single command: one sync run, dry-run unless `--apply`
//! is given.

use clap::Parser;
use std::path::PathBuf;

/// Sync Tailscale devices and services into ControlD DNS rules.
#[derive(Parser, Debug)]
#[command(name = "controld-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, env = "CONTROLD_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Apply changes to ControlD (default is a dry run).
    #[arg(long)]
    pub apply: bool,

    /// Enable debug logging, including HTTP traffic.
    #[arg(short, long)]
    pub debug: bool,

    /// Only log warnings and errors from this tool. Also applies when
    /// `RUST_LOG` is set; otherwise `RUST_LOG` replaces the flags.
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_dry_run() {
        let cli = Cli::try_parse_from(["controld-sync"]).unwrap();
        assert!(!cli.apply);
        assert!(!cli.debug);
        assert!(!cli.quiet);
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "controld-sync",
            "--apply",
            "--debug",
            "--quiet",
            "--config",
            "/etc/controld-sync.yaml",
            "--output",
            "json",
        ])
        .unwrap();

        assert!(cli.apply);
        assert!(cli.debug);
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/controld-sync.yaml")));
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn test_rejects_unknown_output() {
        assert!(Cli::try_parse_from(["controld-sync", "--output", "yaml"]).is_err());
    }
}
