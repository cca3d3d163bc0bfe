/// Bluetooth Low Energy scanning for RuuviTag advertisements
use futures_util::StreamExt;
use log::{debug, error, warn};
use time::OffsetDateTime;
use tokio::time::{sleep, Duration};

use crate::models::Point;
use crate::protocol::{parse_advertisement, RUUVITAG_MANUFACTURER_ID};

/// Scan for RuuviTags and decode their advertised data
///
/// Runs a Low Energy discovery for `scan_duration`, then decodes the
/// manufacturer data of every discovered device. Devices that do not carry
/// Ruuvi manufacturer data, or whose payload fails to parse, are skipped.
/// Filtering by address is left to the caller.
///
/// # Returns
/// Decoded points stamped with the device address and the time they were read
pub async fn scan_for_ruuvitags(
    scan_duration: Duration,
) -> Result<Vec<Point>, Box<dyn std::error::Error + Send + Sync>> {
    let mut points = Vec::new();

    // Initialize Bluetooth session
    let session = match bluer::Session::new().await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create Bluetooth session: {}", e);
            return Err(e.into());
        }
    };

    // Get the default Bluetooth adapter
    let adapter = match session.default_adapter().await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("Failed to get default Bluetooth adapter: {}", e);
            return Err(e.into());
        }
    };

    // Ensure Bluetooth adapter is powered on
    if let Err(e) = adapter.set_powered(true).await {
        error!("Failed to power on adapter: {}", e);
        return Err(e.into());
    }

    // Configure discovery filter for Low Energy devices only
    let filter = bluer::DiscoveryFilter {
        transport: bluer::DiscoveryTransport::Le,
        duplicate_data: false,
        ..Default::default()
    };

    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    // Start device discovery in background
    let discovery_handle = match adapter.discover_devices().await {
        Ok(discovery_stream) => tokio::spawn(async move {
            let mut stream = discovery_stream;
            while let Some(event) = stream.next().await {
                debug!("Discovery event: {:?}", event);
            }
        }),
        Err(e) => {
            error!("Failed to start device discovery: {}", e);
            return Err(e.into());
        }
    };

    sleep(scan_duration).await;
    discovery_handle.abort();

    let devices = match adapter.device_addresses().await {
        Ok(devices) => devices,
        Err(e) => {
            error!("Failed to get device addresses: {}", e);
            return Err(e.into());
        }
    };

    for addr in devices {
        let device = match adapter.device(addr) {
            Ok(device) => device,
            Err(_) => continue,
        };

        let addr_str = device.address().to_string().to_uppercase();

        match device.manufacturer_data().await {
            Ok(Some(manufacturer_data)) => {
                let Some(payload) = manufacturer_data.get(&RUUVITAG_MANUFACTURER_ID) else {
                    continue;
                };
                match parse_advertisement(
                    &addr_str,
                    RUUVITAG_MANUFACTURER_ID,
                    payload,
                    OffsetDateTime::now_utc(),
                ) {
                    Ok(point) => {
                        debug!(
                            "Received data from {}: temp={:.2}°C, humidity={:.2}%, pressure={:.2} hPa, battery={:.0} mV",
                            addr_str, point.temperature, point.humidity, point.pressure, point.battery
                        );
                        points.push(point);
                    }
                    Err(e) => debug!("Unparseable payload from {}: {}", addr_str, e),
                }
            }
            Ok(None) => {
                debug!("No manufacturer data for {}", addr_str);
            }
            Err(e) => {
                debug!("Failed to get manufacturer data for {}: {}", addr_str, e);
            }
        }
    }

    Ok(points)
}
