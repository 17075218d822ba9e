//! Radio driver abstraction.
//!
//! The connection manager never talks to hardware directly. It issues
//! commands and reads link status through [`RadioDriver`], which is
//! implemented by the ESP-IDF driver on the device and by
//! [`SimRadio`](crate::sim::SimRadio) on the host.
//!
//! Every method must return promptly: association and beaconing run in the
//! driver's own task, and the manager learns the outcome by polling
//! [`RadioDriver::station_associated`]. Driver failures are the driver's to
//! log; the manager treats a failed command like an attempt that has not
//! succeeded yet and retries on its own schedule.

use std::net::Ipv4Addr;

/// Operating mode of the single radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RadioMode {
    /// Radio idle.
    #[default]
    Off,
    /// Client of an existing network.
    Station,
    /// Local access point.
    AccessPoint,
    /// Client and access point time-sharing the radio.
    StationAndAccessPoint,
}

impl RadioMode {
    /// Whether the station interface is enabled in this mode.
    pub fn has_station(&self) -> bool {
        matches!(self, Self::Station | Self::StationAndAccessPoint)
    }

    /// Whether the access-point interface is enabled in this mode.
    pub fn has_access_point(&self) -> bool {
        matches!(self, Self::AccessPoint | Self::StationAndAccessPoint)
    }
}

/// Commands and queries the connection manager issues to the radio.
pub trait RadioDriver {
    /// Start (or restart) association with a network.
    fn begin_station(&mut self, ssid: &str, password: &str, hostname: &str);

    /// Drop the station link. `full` also clears the stored station config.
    fn disconnect_station(&mut self, full: bool);

    /// Start (or reconfigure) the local access point.
    fn configure_access_point(&mut self, ssid: &str, password: &str, channel: u8, hidden: bool);

    /// Stop the access point. `full` also clears the stored AP config.
    fn disconnect_access_point(&mut self, full: bool);

    /// Number of clients currently attached to the local access point.
    fn ap_peer_count(&self) -> u8;

    /// Whether the station is associated and has an address.
    fn station_associated(&self) -> bool;

    /// Station address, if any.
    fn local_address(&self) -> Option<Ipv4Addr>;

    /// Switch the radio operating mode.
    fn set_radio_mode(&mut self, mode: RadioMode);
}
