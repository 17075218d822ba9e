//! Read-only view of the connection manager for diagnostics.

use super::fault::ConnectionFault;
use super::radio::RadioMode;
use super::role::RoleState;
use crate::config::ConnectionMode;
use serde::Serialize;
use std::net::Ipv4Addr;

/// Point-in-time copy of the manager state. Contains no secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub mode: ConnectionMode,
    pub radio_mode: RadioMode,
    pub station: RoleState,
    pub access_point: RoleState,
    pub station_ready: bool,
    pub setup_complete: bool,
    pub pending_reconnect: bool,
    pub ap_peers: u8,
    pub local_address: Option<Ipv4Addr>,
    pub last_fault: Option<ConnectionFault>,
    pub hostname: String,
    pub station_ssid: String,
    pub ap_ssid: String,
    pub description: String,
    pub mac: String,
}

impl ConnectionSnapshot {
    /// Serialize to JSON.
    pub fn to_json(&self) -> String {
        // Plain data with string keys; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
