//! In-memory radio and heap for host runs and tests.
//!
//! [`SimRadio`] records every command it receives and associates only when
//! told the network is reachable. [`SimHeap`] replays a script of free-memory
//! readings.

use crate::monitor::MemoryProbe;
use crate::wifi::{RadioDriver, RadioMode};
use log::debug;
use std::collections::VecDeque;
use std::net::Ipv4Addr;

/// A command received by [`SimRadio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCommand {
    BeginStation { ssid: String, hostname: String },
    DisconnectStation { full: bool },
    ConfigureAccessPoint { ssid: String, channel: u8, hidden: bool },
    DisconnectAccessPoint { full: bool },
    SetMode(RadioMode),
}

/// Scripted radio.
#[derive(Debug, Default)]
pub struct SimRadio {
    mode: RadioMode,
    station_begun: bool,
    network_available: bool,
    associate_on_attempt: Option<u32>,
    begin_count: u32,
    ap_up: bool,
    peers: u8,
    commands: Vec<RadioCommand>,
}

impl SimRadio {
    /// Address handed out on association.
    pub const STATION_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

    pub fn new() -> Self {
        Self::default()
    }

    /// Make the configured network reachable (or not). Takes effect for any
    /// station attempt in progress.
    pub fn set_network_available(&mut self, available: bool) {
        self.network_available = available;
    }

    /// Make the network reachable once `attempt` association attempts have
    /// been issued (1-based).
    pub fn associate_on_attempt(mut self, attempt: u32) -> Self {
        self.associate_on_attempt = Some(attempt);
        self
    }

    /// Set the number of clients attached to the local AP.
    pub fn set_peers(&mut self, peers: u8) {
        self.peers = peers;
    }

    /// Commands received so far, oldest first.
    pub fn commands(&self) -> &[RadioCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of `begin_station` calls.
    pub fn begin_count(&self) -> u32 {
        self.begin_count
    }

    /// Current radio mode.
    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    /// Whether the access point is broadcasting.
    pub fn ap_up(&self) -> bool {
        self.ap_up && self.mode.has_access_point()
    }
}

impl RadioDriver for SimRadio {
    fn begin_station(&mut self, ssid: &str, _password: &str, hostname: &str) {
        self.begin_count += 1;
        self.station_begun = true;
        if self.associate_on_attempt == Some(self.begin_count) {
            debug!("sim: network reachable from attempt {}", self.begin_count);
            self.network_available = true;
        }
        self.commands.push(RadioCommand::BeginStation {
            ssid: ssid.to_string(),
            hostname: hostname.to_string(),
        });
    }

    fn disconnect_station(&mut self, full: bool) {
        self.station_begun = false;
        self.commands.push(RadioCommand::DisconnectStation { full });
    }

    fn configure_access_point(&mut self, ssid: &str, _password: &str, channel: u8, hidden: bool) {
        self.ap_up = true;
        self.commands.push(RadioCommand::ConfigureAccessPoint {
            ssid: ssid.to_string(),
            channel,
            hidden,
        });
    }

    fn disconnect_access_point(&mut self, full: bool) {
        self.ap_up = false;
        self.commands.push(RadioCommand::DisconnectAccessPoint { full });
    }

    fn ap_peer_count(&self) -> u8 {
        if self.ap_up() {
            self.peers
        } else {
            0
        }
    }

    fn station_associated(&self) -> bool {
        self.network_available && self.station_begun && self.mode.has_station()
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.station_associated().then_some(Self::STATION_ADDRESS)
    }

    fn set_radio_mode(&mut self, mode: RadioMode) {
        if !mode.has_station() {
            self.station_begun = false;
        }
        self.mode = mode;
        self.commands.push(RadioCommand::SetMode(mode));
    }
}

/// Scripted free-memory readings. The last value repeats once the script
/// runs out.
#[derive(Debug, Clone)]
pub struct SimHeap {
    script: VecDeque<u32>,
    current: u32,
}

impl SimHeap {
    pub fn constant(free: u32) -> Self {
        Self {
            script: VecDeque::new(),
            current: free,
        }
    }

    pub fn scripted<I: IntoIterator<Item = u32>>(readings: I) -> Self {
        let script: VecDeque<u32> = readings.into_iter().collect();
        let current = script.front().copied().unwrap_or(u32::MAX);
        Self { script, current }
    }

    /// Replace the script with a constant reading.
    pub fn set_free(&mut self, free: u32) {
        self.script.clear();
        self.current = free;
    }
}

impl MemoryProbe for SimHeap {
    fn free_bytes(&mut self) -> u32 {
        if let Some(next) = self.script.pop_front() {
            self.current = next;
        }
        self.current
    }
}
