//! WiFi connectivity firmware binary.
//!
//! Joins the network configured at build time (`WIFI_SSID`, `WIFI_PASSWORD`,
//! `WIFI_MODE`, ...), falls back to a local access point when it cannot, and
//! serves connection status on port 8080 once either role is up.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();

    // Initialize ESP-IDF logger for log crate integration
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("=== WiFi connect starting ===");

    if let Err(e) = run() {
        log::error!("Startup failed: {}", e);
    }

    // Nothing left to drive; idle instead of rebooting in a loop.
    loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
    }
}

#[cfg(feature = "esp32")]
fn run() -> Result<(), Box<dyn std::error::Error>> {
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::info;
    use std::sync::Arc;
    use std::time::Duration;
    use wificonnect_esp32::{
        attach_status_server, ConnectionManager, EspHeapProbe, EspRadio, Identity,
        MonotonicClock, NetworkConfig, ResourceMonitor, StatusBoard, DEFAULT_STATUS_PORT,
    };

    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let radio = EspRadio::new(peripherals.modem, sysloop, Some(nvs))?;
    let mac = radio.station_mac()?;
    let config = NetworkConfig::from_build_env()?;

    let mut manager = ConnectionManager::new(&config, &mac, radio)?;
    let board = Arc::new(StatusBoard::new());
    let _status = attach_status_server(&mut manager, board.clone(), DEFAULT_STATUS_PORT);
    manager.register_setup_sequence(|identity: &Identity| {
        info!(
            "{} ({}) services configured",
            identity.hostname(),
            identity.escaped_mac()
        );
    });

    let mut monitor = ResourceMonitor::new(EspHeapProbe);
    let clock = MonotonicClock::new();

    info!("Entering main loop...");
    loop {
        let now = clock.now();
        monitor.sample(now, &mut manager);
        manager.poll(now);
        board.publish(manager.snapshot());
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-sim' to exercise the state machine on the host.");
}
