//! Host simulation of the connection state machine.
//!
//! Drives a [`ConnectionManager`] over a scripted radio and heap in real
//! time and serves its status at http://localhost:8080/status.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug SIM_ASSOCIATE_ON_ATTEMPT=3 cargo run --bin host-sim
//! ```
//!
//! # Environment
//!
//! - `SIM_ASSOCIATE_ON_ATTEMPT` - attempt on which the network becomes
//!   reachable (never, if unset)
//! - `SIM_FREE_HEAP` - constant free-heap reading in bytes (default 64 KiB)
//! - `SIM_TIME_SCALE` - simulated milliseconds per real millisecond
//!   (default 1)
//! - `WIFI_MODE` - `sta`, `sta_ap` or `ap` (default `sta_ap`)

#[cfg(not(target_os = "espidf"))]
mod host {
    use log::{error, info, warn};
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;
    use wificonnect_esp32::sim::{SimHeap, SimRadio};
    use wificonnect_esp32::{
        attach_status_server, ConnectionManager, Credentials, Identity, Millis, MonotonicClock,
        NetworkConfig, ResourceMonitor, StatusBoard, DEFAULT_STATUS_PORT,
    };

    /// Host poll cadence.
    const TICK: Duration = Duration::from_millis(100);

    const SIM_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0xa1, 0xb2, 0xc3];

    fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
        let value = std::env::var(name).ok()?;
        match value.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid {}={}", name, value);
                None
            }
        }
    }

    fn build_config() -> Result<NetworkConfig, wificonnect_esp32::ConfigError> {
        let station = Credentials::new("sim-network", "sim-password")?;
        let mut config = NetworkConfig::new("esp_wificonnect", station)?;
        if let Ok(mode) = std::env::var("WIFI_MODE") {
            config = config.with_mode(mode.parse()?);
        }
        Ok(config)
    }

    #[tokio::main]
    pub async fn main() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        info!("=== WiFi connect host simulation starting ===");

        let config = match build_config() {
            Ok(c) => c,
            Err(e) => {
                error!("Invalid configuration: {}", e);
                std::process::exit(1);
            }
        };

        let mut radio = SimRadio::new();
        if let Some(attempt) = env_parse::<u32>("SIM_ASSOCIATE_ON_ATTEMPT") {
            info!("Network reachable from attempt {}", attempt);
            radio = radio.associate_on_attempt(attempt);
        }
        let free_heap = env_parse::<u32>("SIM_FREE_HEAP").unwrap_or(64 * 1024);
        let scale = env_parse::<u32>("SIM_TIME_SCALE").unwrap_or(1).max(1);

        let mut manager = match ConnectionManager::new(&config, &SIM_MAC, radio) {
            Ok(m) => m,
            Err(e) => {
                error!("Invalid configuration: {}", e);
                std::process::exit(1);
            }
        };

        let board = Arc::new(StatusBoard::new());
        let _status = attach_status_server(&mut manager, board.clone(), DEFAULT_STATUS_PORT);
        manager.register_setup_sequence(|identity: &Identity| {
            info!("One-time setup for {}", identity.description());
        });

        let mut monitor = ResourceMonitor::new(SimHeap::constant(free_heap));
        let clock = MonotonicClock::new();
        let mut ticker = tokio::time::interval(TICK);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!("Entering main loop (Ctrl+C to exit)...");
        let mut was_ready = false;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down...");
                    break;
                }
                _ = ticker.tick() => {
                    let now: Millis = clock.now().wrapping_mul(scale);
                    monitor.sample(now, &mut manager);
                    manager.poll(now);
                    board.publish(manager.snapshot());

                    let ready = manager.is_station_ready();
                    if ready != was_ready {
                        let address = manager.local_address().unwrap_or(Ipv4Addr::UNSPECIFIED);
                        info!("Station ready: {} ({})", ready, address);
                        was_ready = ready;
                    }
                }
            }
        }

        info!("Shutdown complete");
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    host::main();
}

#[cfg(target_os = "espidf")]
fn main() {
    println!("host-sim runs on the host only.");
}
