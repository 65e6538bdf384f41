#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use std::process;

use clap::Parser;
use dotenv::dotenv;
use ssh_probe::probe::client::RusshConnector;
use ssh_probe::probe::commands::LocalTerminal;
use ssh_probe::probe::config::{CONFIG_ERROR_EXIT_CODE, load_settings};
use ssh_probe::probe::{report, run_session};
use tokio::io::BufReader;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() {
    dotenv().ok();

    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                i32::from(CONFIG_ERROR_EXIT_CODE)
            } else {
                0
            };
            // Prints usage errors to stderr, help and version to stdout
            if let Err(print_err) = e.print() {
                init_tracing(false);
                error!("Failed to print usage: {}", print_err);
            }
            process::exit(code);
        }
    };

    init_tracing(cli.verbose);

    let settings = match load_settings(cli.into_overrides()) {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(i32::from(CONFIG_ERROR_EXIT_CODE));
        }
    };

    let terminal = LocalTerminal::new(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        tokio::io::stderr(),
    );

    let outcome = match run_session(&settings, &RusshConnector, terminal).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(i32::from(CONFIG_ERROR_EXIT_CODE));
        }
    };

    if let Some(cause) = outcome.raw_error() {
        debug!("Session ended with: {}", cause);
    }

    match report(&outcome, &settings.request).to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize report: {}", e),
    }

    // A blocked stdin read would keep the runtime from shutting down
    process::exit(i32::from(outcome.code()));
}

/// RUST_LOG wins over `verbose`; logs go to stderr, stdout carries the report.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
