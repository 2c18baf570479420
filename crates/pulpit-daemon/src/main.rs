mod http;
mod log_buffer;

use std::sync::Arc;

use log_buffer::{LogBuffer, LogLayer, LOG_CAPACITY};
use pulpit_core::catalog::CatalogService;
use pulpit_core::credentials::{CredentialProvider, EnvCredentials};
use pulpit_core::monitor::{LiveMonitor, MonitorSettings};
use pulpit_core::ApiClient;
use pulpit_proto::config::Config;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_logging(log_buffer: LogBuffer) -> anyhow::Result<()> {
    let log_path = pulpit_proto::platform::log_path();
    if let Some(dir) = log_path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(LogLayer::new(log_buffer))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,pulpit_core=debug,pulpit_daemon=debug")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_buffer = LogBuffer::new(LOG_CAPACITY);
    init_logging(log_buffer.clone())?;

    let config = Config::load()?;
    info!("Config loaded from: {:?}", Config::config_path());

    let credentials = EnvCredentials::new(&config.api.token_env);
    if credentials.bearer_token().is_none() {
        warn!(
            "{} is not set; ended sessions will not be archived",
            config.api.token_env
        );
    }
    let client = Arc::new(ApiClient::from_config(&config.api, Arc::new(credentials))?);
    info!("Catalog API: {}", client.base_url());

    let cancel = CancellationToken::new();
    let mut loops = Vec::new();

    let (mut catalog, catalog_handle) =
        CatalogService::new(Arc::clone(&client), config.catalog.page_size);

    let monitor = if config.monitor.enabled {
        let (monitor, handle) =
            LiveMonitor::new(Arc::clone(&client), MonitorSettings::from(&config.monitor));
        catalog = catalog.with_monitor_events(handle.subscribe());
        Some((monitor, handle))
    } else {
        info!("Live monitor disabled in config");
        None
    };

    loops.push(tokio::spawn(catalog.run(cancel.clone())));

    let monitor_handle = monitor.map(|(monitor, handle)| {
        loops.push(tokio::spawn(monitor.run(cancel.clone())));
        handle
    });

    let http_handle = if config.http.enabled {
        let state = http::HttpState {
            monitor: monitor_handle.clone(),
            catalog: catalog_handle.clone(),
            log: log_buffer.clone(),
        };
        Some(http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            state,
            cancel.clone(),
        ))
    } else {
        None
    };

    info!("Daemon initialised, waiting for Ctrl-C");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    cancel.cancel();
    for handle in loops {
        if let Err(e) = handle.await {
            warn!("Loop ended abnormally: {}", e);
        }
    }
    if let Some(handle) = http_handle {
        let _ = handle.await;
    }

    Ok(())
}
