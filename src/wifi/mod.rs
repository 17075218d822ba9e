//! WiFi connectivity.
//!
//! # Components
//!
//! - [`ConnectionManager`] - station/access-point state machine
//! - [`RadioDriver`] - radio commands and status queries
//! - [`StationHook`], [`AccessPointHook`], [`SetupSequence`] - activation
//!   hooks for surrounding services
//! - `EspRadio` - ESP-IDF driver (ESP32 only)

mod fault;
mod hooks;
mod manager;
mod radio;
mod role;
mod snapshot;

#[cfg(feature = "esp32")]
mod esp;

pub use fault::ConnectionFault;
pub use hooks::{AccessPointHook, SetupSequence, StationHook};
pub use manager::ConnectionManager;
pub use radio::{RadioDriver, RadioMode};
pub use role::RoleState;
pub use snapshot::ConnectionSnapshot;

#[cfg(feature = "esp32")]
pub use esp::{EspRadio, WifiError};
