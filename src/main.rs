use std::env;
use std::process::ExitCode;

use log::{error, info, warn};

use platewatch::capture::ShutdownReason;
use platewatch::config::{Config, Mode};

const DEFAULT_CONFIG_PATH: &str = "platewatch.toml";

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mode = match env::args().nth(1) {
        Some(arg) => match Mode::from_arg(&arg) {
            Some(mode) => mode,
            None => {
                warn!("unknown mode '{arg}', defaulting to prod");
                Mode::Prod
            }
        },
        None => Mode::Prod,
    };

    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("setup failed: {err}");
            return ExitCode::from(1);
        }
    };
    config.apply_env();

    info!("platewatch starting in {} mode with config {config_path}", mode.as_str());
    match platewatch::run(config, mode).await {
        // A signal-initiated stop is the normal way to turn the kiosk off.
        Ok(ShutdownReason::Cancelled) => ExitCode::SUCCESS,
        // The failure policy exits nonzero so the supervisor restarts us.
        Ok(ShutdownReason::FailurePolicy) => ExitCode::from(1),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}
