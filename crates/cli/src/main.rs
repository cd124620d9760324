// termlight CLI entry point.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_code;
mod output;

use exit_code::ExitCode;

#[derive(Parser)]
#[command(name = "termlight", about = "Annotate known terms in markdown documents")]
struct Cli {
    /// Config file (default: ~/.termlight/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match commands::run(cli.command, cli.config.as_deref()) {
        Ok(()) => ExitCode::Success.into(),
        Err(error) => {
            tracing::debug!(error = %format!("{error:#}"), "command failed");
            ExitCode::from_error(&error).into()
        }
    }
}
