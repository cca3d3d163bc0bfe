use log::{error, info, warn};
use time::OffsetDateTime;
use tokio::sync::oneshot;
use tokio::time::{sleep, Duration};

use ruuvitag_store::bluetooth::scan_for_ruuvitags;
use ruuvitag_store::config::ServiceConfig;
use ruuvitag_store::utils::{format_datetime, truncate};
use ruuvitag_store::{ReadingBuffer, StorageEngine, StorageHandle};

const SCAN_DURATION_SECS: u64 = 10;
const SCAN_RETRY_SECS: u64 = 5;

async fn main_loop(
    config: &ServiceConfig,
    storage: StorageHandle,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Starting RuuviTag data collection service");

    let buffer = ReadingBuffer::new(config.max_staleness).with_filter(&config.mac_filter);
    let period = config.push_period;
    let mut next_push = truncate(OffsetDateTime::now_utc(), period) + period;

    loop {
        match scan_for_ruuvitags(Duration::from_secs(SCAN_DURATION_SECS)).await {
            Ok(points) => {
                for point in points {
                    buffer.push(point);
                }
            }
            Err(e) => {
                error!("Scan failed: {}", e);
                sleep(Duration::from_secs(SCAN_RETRY_SECS)).await;
                continue;
            }
        }

        let now = OffsetDateTime::now_utc();
        if now < next_push {
            continue;
        }

        // Readings are estimated at the period boundary so every device lines up.
        let at = truncate(now, period);
        next_push = at + period;

        let points = buffer.pull_all(at);
        if points.is_empty() {
            warn!("No data collected during this interval!");
            continue;
        }

        match storage.push_points(points.clone()).await {
            Ok(()) => {
                info!("Stored {} points for {}", points.len(), format_datetime(&at));
                for point in &points {
                    info!("  {}", point.summary(&config.names));
                }
            }
            Err(e) => error!("Failed to store points: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Open the store; a failure here is fatal
    let (storage, engine) = match StorageEngine::start(&config.store) {
        Ok(started) => started,
        Err(e) => {
            error!("Failed to start storage engine: {}", e);
            return Err(e.into());
        }
    };

    let (stop_engine, engine_stopped) = oneshot::channel::<()>();
    let engine_task = tokio::spawn(engine.run(async {
        let _ = engine_stopped.await;
    }));

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        let _ = tx.send(());
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(&config, storage) => {
            match result {
                Ok(_) => info!("Program completed successfully"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    let _ = stop_engine.send(());
    if let Err(e) = engine_task.await {
        error!("Storage engine task failed: {}", e);
    }

    Ok(())
}
