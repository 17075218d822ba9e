//! WiFi connectivity manager for ESP32 firmware.
//!
//! This library contains platform-independent components that can be tested
//! on the host machine without ESP32 hardware. The ESP-IDF radio driver and
//! heap probe are compiled only with the `esp32` feature.
//!
//! # Components
//!
//! - [`config`] - credentials, connection mode and policy
//! - [`identity`] - access-point name and description derived from the MAC
//! - [`wifi`] - the connection state machine and radio abstraction
//! - [`monitor`] - free-memory watchdog forcing reconnects
//! - [`network`] - status endpoint attached through activation hooks
//! - [`sim`] - scripted radio and heap for host runs

pub mod config;
pub mod identity;
pub mod monitor;
pub mod network;
pub mod sim;
pub mod time;
pub mod wifi;

pub use config::{ConfigError, ConnectionMode, ConnectionPolicy, Credentials, NetworkConfig};
pub use identity::{HardwareId, Identity};
pub use monitor::{MemoryProbe, MonitorConfig, ReconnectTarget, ResourceMonitor};
pub use network::{attach_status_server, StatusBoard, StatusServer, DEFAULT_STATUS_PORT};
pub use time::{elapsed, Millis, MonotonicClock};
pub use wifi::{
    AccessPointHook, ConnectionFault, ConnectionManager, ConnectionSnapshot, RadioDriver,
    RadioMode, RoleState, SetupSequence, StationHook,
};

#[cfg(feature = "esp32")]
pub use monitor::EspHeapProbe;
#[cfg(feature = "esp32")]
pub use wifi::EspRadio;
