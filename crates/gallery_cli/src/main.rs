mod cli;
mod config;
mod run;
mod summary;

use std::process::ExitCode;

use clap::Parser;
use gallery_logging::{harvest_error, LogDestination};
use log::LevelFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let destination = match &cli.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    gallery_logging::initialize(destination, level);

    match run::run(cli).await {
        Ok(code) => code,
        Err(err) => {
            harvest_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
