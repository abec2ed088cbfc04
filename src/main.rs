use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use poslink::adapters::{
    CandidateDiscovery, DesktopNotificationSink, FileKeyValueStore, ReqwestHttpClient,
    SessionFlag, SharedApiClient, WatchNetworkStatus,
};
use poslink::cli::{handle_version_command, parse_args, CliCommand, RunOptions};
use poslink::config::ResilienceConfig;
use poslink::coordinator::ConnectionMode;
use poslink::traits::NetworkStatus;
use poslink::{ResilienceDeps, ResilienceLayer};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --version before any initialization
    let options = match parse_args(std::env::args()).wrap_err("invalid arguments")? {
        CliCommand::Version => handle_version_command(),
        CliCommand::Run(options) => options,
    };

    color_eyre::install()?;
    init_tracing();

    run(options).await
}

async fn run(options: RunOptions) -> Result<()> {
    let config = ResilienceConfig::from_env();

    let http = Arc::new(ReqwestHttpClient::new());
    let store =
        Arc::new(FileKeyValueStore::open_default().wrap_err("failed to open settings store")?);
    info!(path = %store.path().display(), "Settings store opened");

    let discovery = Arc::new(CandidateDiscovery::new(
        http.clone(),
        store.clone(),
        options.candidates,
        &config,
    ));
    let api = Arc::new(SharedApiClient::new(http.clone()));
    let api_handle = api.handle();
    // No platform connectivity hook on the desktop; assume a wired link.
    let network = Arc::new(WatchNetworkStatus::new(NetworkStatus::ethernet()));

    let layer = ResilienceLayer::new(
        ResilienceDeps {
            discovery,
            http,
            api,
            network,
            store,
            notifications: Arc::new(DesktopNotificationSink::default()),
            session: Arc::new(SessionFlag::new(true)),
        },
        config,
    );
    let coordinator = layer.coordinator().clone();

    if let Some(url) = options.manual_url {
        coordinator.set_connection_mode(ConnectionMode::Manual);
        coordinator.set_manual_url(&url);
    }

    let mut states = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            let line = serde_json::to_string(&*states.borrow_and_update());
            match line {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "Could not render connection state"),
            }
            if states.changed().await.is_err() {
                break;
            }
        }
    });

    // Sustained health loss hands over to the reconnector.
    let mut health = layer.health().subscribe();
    let reconnector = layer.reconnector().clone();
    let watchdog = tokio::spawn(async move {
        while health.changed().await.is_ok() {
            let unavailable = {
                let state = health.borrow_and_update();
                !state.is_available && state.message.is_some()
            };
            if unavailable {
                reconnector.start_auto_reconnect();
            }
        }
    });

    match coordinator.connect().await {
        Ok(()) => info!(base_url = ?api_handle.base_url(), "API client ready"),
        Err(e) if e.is_retryable() => {
            warn!(error = %e, "Initial connect failed, reconnecting in the background");
            coordinator.retry();
        }
        Err(e) => warn!(error = %e, "Initial connect failed"),
    }

    tokio::signal::ctrl_c()
        .await
        .wrap_err("failed to listen for Ctrl+C")?;

    watchdog.abort();
    layer.shutdown();
    printer.abort();
    Ok(())
}
