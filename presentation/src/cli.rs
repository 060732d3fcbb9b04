//! Command-line arguments of the sandbox daemon

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "sandboxd",
    about = "Resource and session orchestration daemon for agent sandboxes",
    version
)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ignore configuration files and run with built-in defaults
    #[arg(long, conflicts_with = "config")]
    pub no_config: bool,

    /// Override the configured listen address
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Override the configured listen port
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Default tracing filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["sandboxd"]);
        assert!(cli.config.is_none());
        assert!(!cli.no_config);
        assert_eq!(cli.log_filter(), "warn");
    }

    #[test]
    fn test_verbosity_stacks() {
        let cli = Cli::parse_from(["sandboxd", "-vv"]);
        assert_eq!(cli.log_filter(), "debug");
        let cli = Cli::parse_from(["sandboxd", "-vvvv"]);
        assert_eq!(cli.log_filter(), "trace");
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from(["sandboxd", "--listen", "0.0.0.0", "--port", "9000"]);
        assert_eq!(cli.listen.as_deref(), Some("0.0.0.0"));
        assert_eq!(cli.port, Some(9000));
    }

    #[test]
    fn test_no_config_conflicts_with_config() {
        let result = Cli::try_parse_from(["sandboxd", "--no-config", "--config", "x.toml"]);
        assert!(result.is_err());
    }
}
