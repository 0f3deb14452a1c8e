//! Carton CLI
//!
//! Inspect and edit a cart kept in a JSON session file against a YAML product catalog.

use std::process::ExitCode;

use clap::Parser;

use crate::cli::Cli;

mod cli;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (ignore if missing)
    _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(error) = cli.run().await {
        #[expect(
            clippy::print_stderr,
            reason = "errors may occur before logging is initialized"
        )]
        {
            eprintln!("{error}");
        }

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
