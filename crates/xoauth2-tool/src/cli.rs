//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use xoauth2_token::config::DEFAULT_CONFIG_PATH;

/// Checks the XOAUTH2 configuration and, optionally, a credential record.
#[derive(Parser, Debug, Clone)]
#[command(name = "xoauth2-tool")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Use this configuration file rather than the system default
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Request a token using the refresh token in this record (the record is
    /// not modified)
    #[arg(short = 'r', long, value_name = "FILE")]
    pub token: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["xoauth2-tool"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(cli.token.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_short_flags() {
        let cli =
            Cli::try_parse_from(["xoauth2-tool", "-c", "test.conf", "-r", "token.json", "-v"])
                .unwrap();
        assert_eq!(cli.config, PathBuf::from("test.conf"));
        assert_eq!(cli.token, Some(PathBuf::from("token.json")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_long_flags() {
        let cli = Cli::try_parse_from([
            "xoauth2-tool",
            "--config=test.conf",
            "--token",
            "token.json",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("test.conf"));
        assert_eq!(cli.token, Some(PathBuf::from("token.json")));
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["xoauth2-tool", "--bogus"]).is_err());
    }
}
