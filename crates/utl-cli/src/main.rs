//! UTL CLI entry point.

use std::{io, process, str::FromStr};

use clap::Parser;
use log::{LevelFilter, debug, error, info};

use utl_cli::{
    Args,
    error_adapter::{render, reports},
};

fn main() {
    miette::set_panic_hook();

    let args = Args::parse();

    let log_level = LevelFilter::from_str(&args.log_level).unwrap_or_else(|_| {
        eprintln!(
            "Invalid log level: {}. Using 'warn' instead.",
            args.log_level
        );
        LevelFilter::Warn
    });

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(log_level)
        .init();

    info!(log_level:?; "Starting UTL");
    debug!(args:?; "Parsed arguments");

    let stdout = io::stdout();
    match utl_cli::run(&args, &mut stdout.lock()) {
        Ok(0) => info!("Completed successfully"),
        Ok(errors) => {
            info!(errors; "Completed with syntax errors");
            process::exit(i32::try_from(errors.min(255)).unwrap_or(255));
        }
        Err(err) => {
            for rendered in render(&reports(&err)) {
                error!("{rendered}");
            }
            process::exit(1);
        }
    }
}
