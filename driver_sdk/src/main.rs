use driver_sdk::api::rest::{build_app, SharedAppState};
use driver_sdk::config::settings::Settings;
use driver_sdk::drivers::replay::ReplayDriver;
use driver_sdk::drivers::traits::DeviceDriver;
use driver_sdk::logging::init_logging;
use driver_sdk::poller::{run_poller, DriverMap};
use driver_sdk::sinks::{LogSink, ValueSink};
use driver_sdk::tags::cache::MemoryValueCache;
use driver_sdk::tags::engine::TagEngine;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    info!("Driver SDK starting...");
    let start_time = Instant::now();

    // --- Load Configuration ---
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            error!(
                "FATAL: Failed to load configuration from {:?}: {}",
                config_path, e
            );
            std::process::exit(1);
        }
    };
    info!(
        "Configuration loaded: {} devices, {} tags, validating {:?} values",
        settings.devices.len(),
        settings.tags.len(),
        settings.engine.validate_on
    );
    for tag in settings.orphan_tags() {
        warn!(
            "Tag '{}' references unknown device '{}' and will never be polled.",
            tag.id, tag.device_id
        );
    }

    // --- Initialize Tag Engine ---
    let tag_engine = Arc::new(TagEngine::with_cache(
        Arc::new(MemoryValueCache::new()),
        settings.engine.validate_on,
    ));
    tag_engine.load_tags(settings.tags.clone());
    info!("Tag Engine initialized.");

    // --- Initialize Drivers ---
    let mut driver_instances = DriverMap::new();
    for driver_config in &settings.devices {
        info!(
            "Initializing driver: {} ({})",
            driver_config.name, driver_config.id
        );
        let driver = Arc::new(ReplayDriver::new(driver_config.clone(), &settings.tags));
        driver
            .connect()
            .await
            .map_err(|e| format!("Failed to connect driver '{}': {}", driver_config.id, e))?;
        driver_instances.insert(driver_config.id.clone(), driver);
    }
    let drivers_arc = Arc::new(driver_instances);
    info!("{} drivers initialized and connected.", drivers_arc.len());

    // --- Start Polling Loop ---
    let sink: Arc<dyn ValueSink> = Arc::new(LogSink);
    tokio::spawn(run_poller(
        Arc::clone(&tag_engine),
        Arc::clone(&drivers_arc),
        sink,
    ));

    // --- Start API Server ---
    let addr: SocketAddr = settings.api.bind.parse()?;
    let api_settings = settings.api.clone();
    let app_state = SharedAppState {
        tag_engine: Arc::clone(&tag_engine),
        driver_count: drivers_arc.len(),
        start_time,
        settings: Arc::new(RwLock::new(settings)),
        config_path: Arc::new(config_path),
    };
    let app = build_app(app_state, &api_settings);

    info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- Shutdown ---
    for (driver_id, driver) in drivers_arc.iter() {
        if let Err(e) = driver.disconnect().await {
            warn!("Failed to disconnect driver '{}': {}", driver_id, e);
        }
    }
    info!("Driver SDK stopped.");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
