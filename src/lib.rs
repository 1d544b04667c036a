// Public modules
pub mod bus;
pub mod client;
pub mod config;
pub mod errors;
pub mod messages;
pub mod poller;
pub mod regio;
pub mod registry;
pub mod sensors;

// Re-export commonly used types
pub use bus::{IicBus, SharedBus, SlaveAddress};
pub use client::DeviceClient;
pub use config::{load_bus_config, load_sensor_config, SensorConfig};
pub use errors::{SensorError, SensorResult};
pub use poller::Poller;
pub use regio::RegisterSequence;
pub use registry::{init_sensors, open_buses};
pub use sensors::{InitPolicy, InitReport, RegisterDriver, SensorDriver, SensorSample};

use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with default configuration
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

/// Bring up buses and sensors from `config_path`, then poll until Ctrl-C.
pub async fn run_wearable_node(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    info!("[WearableNode] starting up...");

    let bus_config = load_bus_config(&format!("{}/buses.toml", config_path))?;
    let sensor_config = load_sensor_config(&format!("{}/sensors.toml", config_path))?;
    info!("[config] loaded {} bus(es), {} sensor(s)", bus_config.buses.len(), sensor_config.sensors.len());

    let buses = open_buses(&bus_config);
    let sensors = init_sensors(&sensor_config, &buses)?;
    info!("[registry] {} sensor(s) ready", sensors.len());

    let now = Instant::now();
    let mut poller = Poller::new();
    for s in sensors {
        poller.add(s.driver, s.frequency_hz, now);
    }

    let device_id = std::env::var("DEVICE_ID").unwrap_or_else(|_| "wearable_node".to_string());
    let client = DeviceClient::new(device_id);

    info!("[main] polling started");
    poller
        .run(client, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("[main] failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
