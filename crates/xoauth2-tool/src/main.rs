//! `xoauth2-tool` - checks an XOAUTH2 installation.
//!
//! Validates the configuration file and, given a credential record, performs
//! one token refresh against the configured endpoint without modifying the
//! record.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod check;
mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use xoauth2_token::{ConsoleSink, DiagnosticLog, ReqwestPoster, Verbosity};

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "xoauth2=trace,xoauth2_token=debug,xoauth2_tool=debug"
    } else {
        "xoauth2=warn,xoauth2_token=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match check::config(&cli.config) {
        Ok(config) => {
            println!("Config check passed.");
            config
        }
        Err(e) => {
            eprintln!("{e:#}");
            println!("Config check failed.");
            return ExitCode::FAILURE;
        }
    };

    if let Some(token) = &cli.token {
        let log = DiagnosticLog::new(ConsoleSink, Verbosity::FullTrace);
        match check::refresh(config, Arc::new(ReqwestPoster::new()), token, &log) {
            Ok(()) => println!("Token refresh succeeded."),
            Err(e) => {
                eprintln!("{e:#}");
                println!("Token refresh failed.");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
