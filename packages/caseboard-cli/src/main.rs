mod cli;
mod config;
mod handlers;

use std::path::PathBuf;

use caseboard_core::BoardEngine;
use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(config::default_config_path);
    let settings = config::apply_overrides(
        config::load_config(&config_path),
        cli.base_url.clone(),
        cli.token.clone(),
    );

    let engine = match BoardEngine::connect(settings) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = handlers::dispatch(&engine, cli.command, cli.json).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
