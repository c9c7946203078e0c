//! Recwatch daemon
//!
//! Supervises Lumix and Sony cameras on the local network and keeps them
//! recording while recording is requested over HTTP.

use argh::FromArgs;
use recwatch::Config;
use tokio::sync::watch;

#[derive(FromArgs)]
/// Recwatch - keeps networked cameras recording past their clip limits
struct Args {
    /// path to the YAML configuration file (optional, defaults apply)
    #[argh(option, short = 'c')]
    config: Option<String>,

    /// HTTP port, overrides the configuration file
    #[argh(option, short = 'p')]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from {}", path);
            Config::from_file(path)?
        }
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.http.port = port;
    }

    log::info!("Starting recwatch...");

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    // Set up Ctrl+C handler
    ctrlc::set_handler({
        let shutdown_tx = shutdown_tx.clone();
        move || {
            log::info!("Received Ctrl+C, shutting down gracefully...");
            shutdown_tx.send(()).ok();
        }
    })?;

    recwatch::run(config, shutdown_rx).await.map_err(|e| e as Box<dyn std::error::Error>)?;

    log::info!("Recwatch stopped.");

    Ok(())
}
