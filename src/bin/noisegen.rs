use anyhow::Context;
use clap::Parser;
use noise_core::{NoiseGenerator, SenderFactory, metrics};
use noise_senders::DestinationSenderFactory;
use noisegen::config::DEFAULT_LOG_FILTER;
use noisegen::{AppState, Cli, Store, router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "Initializing noisegen");

    // Register metrics so /metrics lists them before the first run
    let _ = &*metrics::EVENTS_GENERATED;
    let _ = &*metrics::EVENTS_SENT;
    let _ = &*metrics::CYCLE_ERRORS;
    let _ = &*metrics::SEND_DURATION;
    let _ = &*metrics::RUNNING;

    let store = Arc::new(
        Store::open(&cli.data_file)
            .with_context(|| format!("failed to load {}", cli.data_file.display()))?,
    );
    let registry = Arc::new(noise_generators::default_registry());
    info!(
        event_types = registry.len(),
        destinations = store.destinations().len(),
        data_file = %cli.data_file.display(),
        "Catalog and store loaded."
    );

    let factory: Arc<dyn SenderFactory> =
        Arc::new(DestinationSenderFactory::new().with_hec_timeout(cli.hec_timeout()));
    let generator = NoiseGenerator::new(registry, factory.clone());

    if cli.autostart {
        match store.noise_config() {
            Some(config) => {
                if let Err(e) = generator.start(config, &store.destination_map()).await {
                    warn!(error = %e, "Autostart failed; waiting for API start");
                }
            }
            None => info!("Autostart requested but no saved noise config"),
        }
    }

    let app = router(AppState {
        generator: generator.clone(),
        store,
        factory,
    });

    let listener = TcpListener::bind(cli.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind_address))?;
    info!(addr = %cli.bind_address, "noisegen listening.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("Shutting down...");
        })
        .await
        .context("server error")?;

    if generator.is_running() {
        generator.stop().await?;
    }
    info!("Senders closed. Goodbye.");
    Ok(())
}
