#![forbid(unsafe_code)]

use clap::Parser;
use sensor_gate_lib::config::{logging_from_env, read_from_env, read_from_path, validate, LoggingConfig};
use sensor_gate_lib::telemetry::init_tracing;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Access-controlled sensor reading API")]
struct Cli {
    /// Path to configuration TOML file. When absent, configuration is read
    /// from environment variables.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => match read_from_path(path) {
            Ok(cfg) => {
                install_tracing(&cfg.logging);
                cfg
            }
            Err(err) => {
                eprintln!("failed to load configuration: {err}");
                std::process::exit(1);
            }
        },
        None => {
            // Reading the environment may warn
            install_tracing(&logging_from_env());
            read_from_env()
        }
    };
    validate(&mut cfg);

    info!(
        listen = %cfg.listen,
        source = if cli.config.is_some() { "file" } else { "environment" },
        allowed_networks = cfg.security.allowed_networks.len(),
        principals = cfg.security.principals.len(),
        window_seconds = cfg.security.rate_limit.window_seconds,
        max_requests = cfg.security.rate_limit.max_requests,
        "configuration loaded"
    );
    if cfg.security.allowed_networks.is_empty() {
        warn!("no allowed networks configured, every address may connect");
    }

    if let Err(err) = sensor_gate_lib::api::run(Arc::new(cfg)).await {
        error!(%err, "server exited with error");
        std::process::exit(1);
    }
}

fn install_tracing(logging: &LoggingConfig) {
    if let Err(err) = init_tracing(&logging.level, logging.show_target) {
        eprintln!("failed to initialise tracing: {err}");
        std::process::exit(1);
    }
}
