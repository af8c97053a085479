use anyhow::{Context, Result};
use edge_agent::actuation::LoggingActuator;
use edge_agent::config::AgentConfig;
use edge_agent::dispatch::Dispatcher;
use edge_agent::gateway::{GatewayEvent, GatewayEvents, TcpGateway};
use edge_agent::registration::StaticClaimer;
use edge_agent::vault::{FileSecretStore, Sealer};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AgentConfig::load();

    // Initialize tracing; RUST_LOG wins over the configured level
    let default_level = config
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Couldn't start the device provider: {:#}", e);
            return Err(e);
        }
    };

    info!("Edge agent starting: provider {}", config.provider.provider_id);
    info!("  Provider service: {}", config.provider.address);
    info!("  Vault directory: {}", config.vault.directory);

    let vault = Arc::new(
        FileSecretStore::open(&config.vault.directory)
            .await
            .with_context(|| format!("Couldn't open vault directory {}", config.vault.directory))?,
    );

    let sealer = Sealer::new(config.vault_passphrase.clone());
    let (gateway, events) = TcpGateway::start(config.gateway_config(), vault, sealer);
    let gateway = Arc::new(gateway);

    let claimer = Arc::new(StaticClaimer::new(
        config.registration.source.clone(),
        config.registration.actuators.clone(),
    ));
    let dispatcher = Dispatcher::new(
        gateway.clone(),
        Arc::new(LoggingActuator),
        claimer,
        config.executor_config(),
    );

    tokio::select! {
        _ = run_event_loop(events, &dispatcher) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    // Drain actuations while the session can still carry their outcomes
    dispatcher.shutdown().await;
    gateway.shutdown();
    info!("Edge agent stopped");
    Ok(())
}

/// Forward gateway events to the dispatcher until the gateway goes away
async fn run_event_loop(mut events: GatewayEvents, dispatcher: &Dispatcher) {
    loop {
        match events.recv().await {
            Some(GatewayEvent::Connected { address }) => {
                info!("Connected to provider service at {}", address);
            }
            Some(GatewayEvent::Disconnected { reason }) => {
                warn!("Disconnected: {}", reason);
            }
            Some(GatewayEvent::ConnectionFailed { reason }) => {
                error!("Connection failed: {}", reason);
            }
            Some(GatewayEvent::Received(event)) => {
                dispatcher.dispatch(event).await;
            }
            None => {
                error!("Provider gateway closed");
                break;
            }
        }
    }
}
