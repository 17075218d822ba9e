//! Connection state machine.
//!
//! [`ConnectionManager`] decides, one cooperative step at a time, which radio
//! role should be up: it starts and retries station association, falls back
//! to a local access point when the station keeps failing (dual mode only),
//! tears the access point down again once the station connects, and drains
//! forced-reconnect requests raised by the operator or the
//! [`ResourceMonitor`](crate::monitor::ResourceMonitor).
//!
//! # Algorithm
//!
//! Each [`poll`](ConnectionManager::poll) performs at most one transition:
//!
//! 1. A pending reconnect resets the affected roles and ends the step.
//! 2. Modes with a station role reconcile the station: first attempt, AP
//!    peer yield, retry after the interval, link-loss restart, fallback to
//!    the access point, or activation on successful association.
//! 3. Access-point-only mode opens the access point if it is not up.
//!
//! No step blocks and nothing is returned to the caller: radio failures just
//! leave the station unassociated, which the retry schedule absorbs.
//!
//! # Example
//!
//! ```
//! use wificonnect_esp32::config::{ConnectionMode, Credentials, NetworkConfig};
//! use wificonnect_esp32::sim::SimRadio;
//! use wificonnect_esp32::wifi::ConnectionManager;
//!
//! let station = Credentials::new("HomeNet", "password123").unwrap();
//! let config = NetworkConfig::new("esp_wificonnect", station)
//!     .unwrap()
//!     .with_mode(ConnectionMode::StationOnly);
//! let mac = [0x24, 0x0a, 0xc4, 0xa1, 0xb2, 0xc3];
//! let mut manager = ConnectionManager::new(&config, &mac, SimRadio::new()).unwrap();
//!
//! manager.poll(0);
//! assert!(manager.station().active());
//!
//! manager.radio_mut().set_network_available(true);
//! manager.poll(100);
//! assert!(manager.is_station_ready());
//! ```

use super::fault::ConnectionFault;
use super::hooks::{AccessPointHook, SetupSequence, StationHook};
use super::radio::{RadioDriver, RadioMode};
use super::role::RoleState;
use super::snapshot::ConnectionSnapshot;
use crate::config::{ConfigError, ConnectionMode, ConnectionPolicy, NetworkConfig};
use crate::identity::{HardwareId, Identity};
use crate::monitor::ReconnectTarget;
use crate::time::{elapsed, Millis};
use log::{debug, error, info, warn};
use std::net::Ipv4Addr;

/// Drives one radio through station, fallback and access-point roles.
pub struct ConnectionManager<R: RadioDriver> {
    radio: R,
    identity: Identity,
    mode: ConnectionMode,
    policy: ConnectionPolicy,
    radio_mode: RadioMode,
    station: RoleState,
    access_point: RoleState,
    pending_reconnect: bool,
    setup_complete: bool,
    last_peer_count: u8,
    last_fault: Option<ConnectionFault>,
    station_hook: Option<Box<dyn StationHook>>,
    access_point_hook: Option<Box<dyn AccessPointHook>>,
    setup: Option<Box<dyn SetupSequence>>,
}

impl<R: RadioDriver> ConnectionManager<R> {
    /// Derive the identity from `config` and the hardware id, and take
    /// ownership of the radio. Nothing is sent to the radio until the first
    /// [`poll`](Self::poll).
    pub fn new(config: &NetworkConfig, mac: &HardwareId, radio: R) -> Result<Self, ConfigError> {
        let identity = Identity::derive(config, mac)?;

        info!(
            "Connectivity: hostname {}, station SSID {}, AP SSID {}, mode {}",
            identity.hostname(),
            identity.station_ssid(),
            identity.ap_ssid(),
            config.mode
        );

        Ok(Self {
            radio,
            identity,
            mode: config.mode,
            policy: config.policy,
            radio_mode: RadioMode::Off,
            station: RoleState::default(),
            access_point: RoleState::default(),
            pending_reconnect: false,
            setup_complete: false,
            last_peer_count: 0,
            last_fault: None,
            station_hook: None,
            access_point_hook: None,
            setup: None,
        })
    }

    // ==================== Hooks ====================

    /// Set the hook invoked each time the station becomes ready.
    /// Replaces any previously registered station hook.
    pub fn register_station_hook<H: StationHook + 'static>(&mut self, hook: H) {
        self.station_hook = Some(Box::new(hook));
    }

    /// Set the hook invoked when the access point first starts serving.
    /// Replaces any previously registered access-point hook.
    pub fn register_access_point_hook<H: AccessPointHook + 'static>(&mut self, hook: H) {
        self.access_point_hook = Some(Box::new(hook));
    }

    /// Set the one-time setup sequence. Replaces any previous one.
    pub fn register_setup_sequence<S: SetupSequence + 'static>(&mut self, setup: S) {
        self.setup = Some(Box::new(setup));
    }

    // ==================== Mode ====================

    /// Change the connection mode. The next [`poll`](Self::poll) reconciles
    /// the radio with it.
    pub fn set_mode(&mut self, mode: ConnectionMode) {
        if mode == self.mode {
            return;
        }
        info!("Connection mode {} -> {}", self.mode, mode);
        self.mode = mode;
        self.last_peer_count = 0;

        // A connected station keeps its link across sta <-> sta_ap changes;
        // anything else restarts the station schedule from scratch.
        if !self.station.server_initialized {
            self.station.last_attempt = None;
            self.station.attempts = 0;
        }
    }

    /// Current connection mode.
    pub fn current_mode(&self) -> ConnectionMode {
        self.mode
    }

    /// Whether the current mode attempts station association.
    pub fn needs_station_role(&self) -> bool {
        self.mode.needs_station()
    }

    // ==================== Status ====================

    /// Station connected and its hook has run.
    pub fn is_station_ready(&self) -> bool {
        self.station.server_initialized && self.station.was_connected
    }

    /// One-time setup sequence has run.
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete
    }

    /// Station associated according to the radio.
    pub fn is_connected(&self) -> bool {
        self.radio.station_associated()
    }

    /// Station address, if associated.
    pub fn local_address(&self) -> Option<Ipv4Addr> {
        self.radio.local_address()
    }

    /// Reconnect requested and not yet drained.
    pub fn pending_reconnect(&self) -> bool {
        self.pending_reconnect
    }

    /// Most recent absorbed fault.
    pub fn last_fault(&self) -> Option<ConnectionFault> {
        self.last_fault
    }

    /// Station role status.
    pub fn station(&self) -> &RoleState {
        &self.station
    }

    /// Access-point role status.
    pub fn access_point(&self) -> &RoleState {
        &self.access_point
    }

    /// Last mode requested from the radio.
    pub fn radio_mode(&self) -> RadioMode {
        self.radio_mode
    }

    /// Active policy.
    pub fn policy(&self) -> &ConnectionPolicy {
        &self.policy
    }

    /// Device identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn hostname(&self) -> &str {
        self.identity.hostname()
    }

    pub fn station_ssid(&self) -> &str {
        self.identity.station_ssid()
    }

    pub fn station_password(&self) -> &str {
        self.identity.station_password()
    }

    pub fn ap_ssid(&self) -> &str {
        self.identity.ap_ssid()
    }

    pub fn ap_password(&self) -> &str {
        self.identity.ap_password()
    }

    /// The radio driver.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// The radio driver, mutably. Commands issued through this bypass the
    /// state machine.
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Copy of the current state for diagnostics. Contains no secrets.
    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            mode: self.mode,
            radio_mode: self.radio_mode,
            station: self.station.clone(),
            access_point: self.access_point.clone(),
            station_ready: self.is_station_ready(),
            setup_complete: self.setup_complete,
            pending_reconnect: self.pending_reconnect,
            ap_peers: self.last_peer_count,
            local_address: self.radio.local_address(),
            last_fault: self.last_fault,
            hostname: self.identity.hostname().to_string(),
            station_ssid: self.identity.station_ssid().to_string(),
            ap_ssid: self.identity.ap_ssid().to_string(),
            description: self.identity.description().to_string(),
            mac: self.identity.escaped_mac().to_string(),
        }
    }

    // ==================== Reconnect ====================

    /// Ask for a full reset of connectivity. Takes effect on the next poll.
    pub fn request_reconnect(&mut self) {
        debug!("Reconnect requested");
        self.pending_reconnect = true;
    }

    // ==================== State machine ====================

    /// Advance the state machine by at most one transition.
    ///
    /// `now` is a wrapping millisecond clock reading.
    pub fn poll(&mut self, now: Millis) {
        if self.pending_reconnect {
            self.drain_reconnect();
            return;
        }

        if self.mode.needs_station() {
            self.reconcile_station(now);
        } else if !self.access_point.active {
            self.enter_access_point_only();
        } else if self.station.active {
            // Left over from dual mode; the AP keeps serving.
            self.release_station();
            self.switch_radio(RadioMode::AccessPoint);
        }

        self.check_invariants();
    }

    fn drain_reconnect(&mut self) {
        warn!("Forcing reconnect");
        self.pending_reconnect = false;
        self.last_peer_count = 0;

        let dual = self.mode.is_dual();
        let reset_station = dual || self.mode.needs_station() || self.station.active;
        let reset_ap = dual || !self.mode.needs_station() || self.access_point.active;

        if reset_station {
            if self.station.active {
                self.radio.disconnect_station(true);
            }
            self.station.reset();
        }
        if reset_ap {
            if self.access_point.active {
                self.radio.disconnect_access_point(true);
            }
            self.access_point.reset();
        }
        if !self.station.active && !self.access_point.active {
            self.switch_radio(RadioMode::Off);
        }
    }

    fn reconcile_station(&mut self, now: Millis) {
        let Some(last_attempt) = self.station.last_attempt else {
            self.begin_station(now);
            return;
        };

        let associated = self.radio.station_associated();

        if self.access_point.active && self.policy.yield_to_ap_peers {
            self.yield_to_ap_peers(associated);
        }

        if !associated {
            self.handle_station_down(now, last_attempt);
        } else if !self.station.server_initialized {
            self.activate_station();
        }
    }

    /// Drop a pending association attempt while clients use the local AP.
    fn yield_to_ap_peers(&mut self, associated: bool) {
        let peers = self.radio.ap_peer_count();
        if peers == self.last_peer_count {
            return;
        }
        self.last_peer_count = peers;
        info!("Connected AP clients: {}", peers);

        if !associated && peers > 0 {
            debug!("Yielding radio to AP clients, dropping station attempt");
            self.radio.disconnect_station(false);
        }
    }

    fn handle_station_down(&mut self, now: Millis, last_attempt: Millis) {
        let retries_apply = match self.mode {
            ConnectionMode::StationOnly => true,
            ConnectionMode::StationWithFallbackAP => !self.access_point.active,
            ConnectionMode::AccessPointOnly => false,
        };

        if retries_apply {
            if self.station.server_initialized {
                warn!("Station link lost");
                self.station.server_initialized = false;
                self.station.attempts = 0;
                self.begin_station(now);
                return;
            }

            if elapsed(now, last_attempt) > self.policy.retry_interval_ms {
                self.station.record_failure();
                self.last_fault = Some(ConnectionFault::AssociationTimeout);
                info!("Station reconnect attempt {}", self.station.attempts);
                self.begin_station(now);
                return;
            }
        }

        if self.mode.is_dual() && self.station.attempts > self.policy.fallback_threshold {
            self.fall_back_to_access_point();
        }
    }

    fn fall_back_to_access_point(&mut self) {
        warn!(
            "Station failed {} attempts, falling back to access point",
            self.station.attempts
        );
        self.station.attempts = 0;
        self.radio.disconnect_station(true);
        self.station.deactivate();
        self.switch_radio(RadioMode::AccessPoint);
        self.init_access_point();
    }

    fn activate_station(&mut self) {
        self.run_setup();

        let address = self.radio.local_address();
        match address {
            Some(ip) => info!("Station connected, IP address: {}", ip),
            None => info!("Station connected"),
        }

        if self.access_point.active {
            self.release_access_point();
            self.switch_radio(RadioMode::Station);
            info!("Access point disabled");
        }

        if let Some(hook) = self.station_hook.as_mut() {
            hook.on_station_ready(&self.identity, address);
        }

        self.station.server_initialized = true;
        self.station.was_connected = true;
        self.station.attempts = 0;
    }

    fn begin_station(&mut self, now: Millis) {
        if self.access_point.active && !self.mode.is_dual() {
            info!("Access point disabled");
            self.release_access_point();
        }

        if !self.station.active {
            let mode = if self.access_point.active {
                RadioMode::StationAndAccessPoint
            } else {
                RadioMode::Station
            };
            self.switch_radio(mode);
            self.station.active = true;
        }

        info!("Connecting to {} ...", self.identity.station_ssid());
        self.radio.begin_station(
            self.identity.station_ssid(),
            self.identity.station_password(),
            self.identity.hostname(),
        );
        self.station.record_attempt(now);
    }

    fn enter_access_point_only(&mut self) {
        self.release_station();
        self.switch_radio(RadioMode::AccessPoint);
        self.init_access_point();
    }

    fn release_station(&mut self) {
        self.radio.disconnect_station(true);
        self.station.deactivate();
    }

    /// Peer counts from a previous AP session say nothing about the next.
    fn release_access_point(&mut self) {
        self.radio.disconnect_access_point(true);
        self.access_point.deactivate();
        self.last_peer_count = 0;
    }

    fn init_access_point(&mut self) {
        info!("Opening access point {}", self.identity.ap_ssid());
        self.radio.configure_access_point(
            self.identity.ap_ssid(),
            self.identity.ap_password(),
            self.policy.ap_channel,
            self.policy.ap_hidden,
        );

        if !self.access_point.active && !self.access_point.server_initialized {
            self.run_setup();
            info!("Access point services starting");
            if let Some(hook) = self.access_point_hook.as_mut() {
                hook.on_access_point_ready(&self.identity);
            }
            self.access_point.server_initialized = true;
        }

        self.access_point.active = true;
        self.access_point.was_connected = true;
    }

    fn run_setup(&mut self) {
        if self.setup_complete {
            return;
        }
        info!("Running one-time setup");
        if let Some(setup) = self.setup.as_mut() {
            setup.run(&self.identity);
        }
        self.setup_complete = true;
    }

    fn switch_radio(&mut self, mode: RadioMode) {
        if mode != self.radio_mode {
            debug!("Radio mode {:?} -> {:?}", self.radio_mode, mode);
        }
        self.radio.set_radio_mode(mode);
        self.radio_mode = mode;
    }

    fn check_invariants(&mut self) {
        let both_up = self.station.active && self.access_point.active;
        let conflict = !self.station.is_consistent()
            || !self.access_point.is_consistent()
            || (both_up && !self.mode.is_dual());

        if conflict {
            error!(
                "Role conflict in mode {}: station {:?}, access point {:?}",
                self.mode, self.station, self.access_point
            );
            self.last_fault = Some(ConnectionFault::RoleConflict);
            debug_assert!(false, "role state invariant violated");
        }
    }
}

impl<R: RadioDriver> ReconnectTarget for ConnectionManager<R> {
    fn force_reconnect(&mut self, reason: ConnectionFault) {
        self.last_fault = Some(reason);
        self.request_reconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::sim::{RadioCommand, SimRadio};
    use std::cell::Cell;
    use std::rc::Rc;

    const MAC: HardwareId = [0x24, 0x0a, 0xc4, 0xa1, 0xb2, 0xc3];

    fn config(mode: ConnectionMode) -> NetworkConfig {
        let station = Credentials::new("HomeNet", "password123").unwrap();
        NetworkConfig::new("esp_wificonnect", station)
            .unwrap()
            .with_mode(mode)
    }

    fn manager(mode: ConnectionMode) -> ConnectionManager<SimRadio> {
        ConnectionManager::new(&config(mode), &MAC, SimRadio::new()).unwrap()
    }

    /// Poll every `step` ms from `from` to `to` inclusive.
    fn run(manager: &mut ConnectionManager<SimRadio>, from: Millis, to: Millis, step: Millis) {
        let mut now = from;
        while now <= to {
            manager.poll(now);
            now += step;
        }
    }

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let c = Rc::new(Cell::new(0));
        (c.clone(), c)
    }

    // ==================== Station Retry Tests ====================

    #[test]
    fn test_first_poll_begins_station() {
        let mut m = manager(ConnectionMode::StationOnly);
        m.poll(0);

        assert!(m.station().active());
        assert_eq!(m.station().last_attempt(), Some(0));
        assert_eq!(m.station().attempts(), 0);
        assert_eq!(m.radio().begin_count(), 1);
        assert_eq!(m.radio_mode(), RadioMode::Station);
        assert!(m.radio().commands().contains(&RadioCommand::BeginStation {
            ssid: "HomeNet".to_string(),
            hostname: "esp_wificonnect".to_string(),
        }));
    }

    #[test]
    fn test_station_only_single_retry_after_interval() {
        let mut m = manager(ConnectionMode::StationOnly);
        run(&mut m, 0, 18_100, 100);

        assert_eq!(m.station().attempts(), 1);
        assert_eq!(m.radio().begin_count(), 2);
        assert!(!m.is_station_ready());
        assert_eq!(m.last_fault(), Some(ConnectionFault::AssociationTimeout));
    }

    #[test]
    fn test_no_retry_before_interval_elapses() {
        let mut m = manager(ConnectionMode::StationOnly);
        run(&mut m, 0, 18_000, 100);

        assert_eq!(m.station().attempts(), 0);
        assert_eq!(m.radio().begin_count(), 1);
    }

    #[test]
    fn test_retry_at_most_once_per_interval() {
        let mut m = manager(ConnectionMode::StationOnly);
        let mut increments = Vec::new();
        let mut previous = 0;

        let mut now = 0;
        while now <= 100_000 {
            m.poll(now);
            if m.station().attempts() != previous {
                assert_eq!(m.station().attempts(), previous + 1);
                previous = m.station().attempts();
                increments.push(now);
            }
            now += 50;
        }

        assert_eq!(increments.len(), 5);
        for pair in increments.windows(2) {
            assert!(pair[1] - pair[0] > 18_000);
        }
    }

    #[test]
    fn test_retry_interval_survives_clock_wrap() {
        let mut m = manager(ConnectionMode::StationOnly);
        let start = u32::MAX - 5_000;

        m.poll(start);
        m.poll(start.wrapping_add(10_000));
        assert_eq!(m.station().attempts(), 0);

        m.poll(start.wrapping_add(18_001));
        assert_eq!(m.station().attempts(), 1);
        assert_eq!(m.station().last_attempt(), Some(start.wrapping_add(18_001)));
    }

    // ==================== Fallback Tests ====================

    #[test]
    fn test_dual_mode_falls_back_to_access_point() {
        let mut m = manager(ConnectionMode::StationWithFallbackAP);
        let (ap_calls, seen) = counter();
        m.register_access_point_hook(move |_: &Identity| seen.set(seen.get() + 1));

        run(&mut m, 0, 73_000, 100);

        assert!(m.access_point().active());
        assert!(m.access_point().server_initialized());
        assert!(!m.station().active());
        assert_eq!(m.station().attempts(), 0);
        assert_eq!(m.radio_mode(), RadioMode::AccessPoint);
        assert_eq!(ap_calls.get(), 1);
        assert!(m.is_setup_complete());
        assert!(m
            .radio()
            .commands()
            .contains(&RadioCommand::ConfigureAccessPoint {
                ssid: "espwific-a1b2c3".to_string(),
                channel: 1,
                hidden: false,
            }));
    }

    #[test]
    fn test_fallback_happens_on_poll_after_threshold_exceeded() {
        let mut m = manager(ConnectionMode::StationWithFallbackAP);
        m.poll(0);
        for i in 1..=4u32 {
            m.poll(i * 18_001);
        }
        assert_eq!(m.station().attempts(), 4);
        assert!(!m.access_point().active());

        m.poll(4 * 18_001 + 1);
        assert!(m.access_point().active());
    }

    #[test]
    fn test_station_only_never_falls_back() {
        let mut m = manager(ConnectionMode::StationOnly);
        run(&mut m, 0, 200_000, 500);

        assert!(!m.access_point().active());
        assert!(m.station().attempts() > 3);
    }

    #[test]
    fn test_station_retries_pause_while_fallback_ap_serves() {
        let mut m = manager(ConnectionMode::StationWithFallbackAP);
        run(&mut m, 0, 73_000, 100);
        let begins = m.radio().begin_count();

        run(&mut m, 73_100, 200_000, 100);

        assert_eq!(m.radio().begin_count(), begins);
        assert!(m.access_point().active());
    }

    #[test]
    fn test_forced_reconnect_resumes_station_after_fallback() {
        let mut m = manager(ConnectionMode::StationWithFallbackAP);
        run(&mut m, 0, 73_000, 100);
        let begins = m.radio().begin_count();

        m.request_reconnect();
        m.poll(73_100);
        assert!(!m.access_point().active());
        assert!(!m.station().active());
        assert_eq!(m.radio().begin_count(), begins);

        m.poll(73_200);
        assert!(m.station().active());
        assert_eq!(m.radio().begin_count(), begins + 1);
    }

    #[test]
    fn test_mode_change_resumes_station_after_fallback() {
        let mut m = manager(ConnectionMode::StationWithFallbackAP);
        run(&mut m, 0, 73_000, 100);
        assert!(m.access_point().active());
        let begins = m.radio().begin_count();
        m.radio_mut().clear_commands();

        m.set_mode(ConnectionMode::StationOnly);
        m.poll(73_100);

        assert_eq!(m.radio().begin_count(), begins + 1);
        assert!(m
            .radio()
            .commands()
            .contains(&RadioCommand::DisconnectAccessPoint { full: true }));
        assert!(!m.access_point().active());
        assert!(m.station().active());
        assert_eq!(m.radio_mode(), RadioMode::Station);
    }

    // ==================== Activation Tests ====================

    #[test]
    fn test_association_activates_station_once() {
        let mut m = manager(ConnectionMode::StationWithFallbackAP);
        let (station_calls, seen) = counter();
        m.register_station_hook(move |_: &Identity, _: Option<Ipv4Addr>| {
            seen.set(seen.get() + 1)
        });

        m.poll(0);
        m.radio_mut().set_network_available(true);
        m.poll(100);

        assert!(m.is_station_ready());
        assert!(m.is_setup_complete());
        assert_eq!(station_calls.get(), 1);

        run(&mut m, 200, 60_000, 100);
        assert_eq!(station_calls.get(), 1);
        assert_eq!(m.radio().begin_count(), 1);
    }

    #[test]
    fn test_station_hook_receives_address() {
        let mut m = manager(ConnectionMode::StationOnly);
        let seen = Rc::new(Cell::new(None));
        let sink = seen.clone();
        m.register_station_hook(move |_: &Identity, addr: Option<Ipv4Addr>| sink.set(addr));

        m.poll(0);
        m.radio_mut().set_network_available(true);
        m.poll(100);

        assert_eq!(seen.get(), Some(SimRadio::STATION_ADDRESS));
        assert_eq!(m.local_address(), Some(SimRadio::STATION_ADDRESS));
    }

    #[test]
    fn test_association_tears_down_access_point() {
        let mut m = manager(ConnectionMode::AccessPointOnly);
        m.poll(0);
        assert!(m.access_point().active());

        m.set_mode(ConnectionMode::StationWithFallbackAP);
        m.poll(100);
        // Dual mode: station attempt runs while the AP keeps serving.
        assert!(m.station().active());
        assert!(m.access_point().active());
        assert_eq!(m.radio_mode(), RadioMode::StationAndAccessPoint);

        m.radio_mut().set_network_available(true);
        m.poll(200);

        assert!(m.is_station_ready());
        assert!(!m.access_point().active());
        assert!(!m.access_point().server_initialized());
        assert_eq!(m.radio_mode(), RadioMode::Station);
        assert!(m
            .radio()
            .commands()
            .contains(&RadioCommand::DisconnectAccessPoint { full: true }));
    }

    #[test]
    fn test_setup_runs_once_across_cycles() {
        let mut m = manager(ConnectionMode::StationOnly);
        let (setup_calls, seen) = counter();
        m.register_setup_sequence(move |_: &Identity| seen.set(seen.get() + 1));
        let (station_calls, hook_seen) = counter();
        m.register_station_hook(move |_: &Identity, _: Option<Ipv4Addr>| {
            hook_seen.set(hook_seen.get() + 1)
        });

        m.poll(0);
        let mut now = 0;
        for _ in 0..3 {
            m.radio_mut().set_network_available(true);
            now += 100;
            m.poll(now);
            assert!(m.is_station_ready());

            m.radio_mut().set_network_available(false);
            now += 100;
            m.poll(now);
            assert!(!m.is_station_ready());
        }

        assert_eq!(setup_calls.get(), 1);
        assert_eq!(station_calls.get(), 3);
    }

    #[test]
    fn test_link_loss_restarts_station_immediately() {
        let mut m = manager(ConnectionMode::StationOnly);
        m.poll(0);
        m.radio_mut().set_network_available(true);
        m.poll(100);
        m.radio_mut().set_network_available(false);
        m.poll(200);

        assert!(!m.station().server_initialized());
        assert!(m.station().was_connected());
        assert_eq!(m.station().attempts(), 0);
        assert_eq!(m.station().last_attempt(), Some(200));
        assert_eq!(m.radio().begin_count(), 2);
    }

    // ==================== Access Point Mode Tests ====================

    #[test]
    fn test_access_point_only_mode() {
        let mut m = manager(ConnectionMode::AccessPointOnly);
        let (ap_calls, seen) = counter();
        m.register_access_point_hook(move |_: &Identity| seen.set(seen.get() + 1));

        run(&mut m, 0, 10_000, 100);

        assert!(m.access_point().active());
        assert!(!m.station().active());
        assert!(m.is_setup_complete());
        assert!(!m.needs_station_role());
        assert_eq!(ap_calls.get(), 1);
        assert_eq!(m.radio().begin_count(), 0);

        let configures = m
            .radio()
            .commands()
            .iter()
            .filter(|c| matches!(c, RadioCommand::ConfigureAccessPoint { .. }))
            .count();
        assert_eq!(configures, 1);
    }

    #[test]
    fn test_mode_change_to_station_only_tears_down_ap() {
        let mut m = manager(ConnectionMode::AccessPointOnly);
        m.poll(0);

        m.set_mode(ConnectionMode::StationOnly);
        assert_eq!(m.current_mode(), ConnectionMode::StationOnly);
        m.poll(100);

        assert!(m.station().active());
        assert!(!m.access_point().active());
        assert_eq!(m.radio_mode(), RadioMode::Station);
    }

    #[test]
    fn test_mode_change_to_access_point_only_drops_station() {
        let mut m = manager(ConnectionMode::StationOnly);
        m.poll(0);
        m.radio_mut().set_network_available(true);
        m.poll(100);
        assert!(m.is_station_ready());

        m.set_mode(ConnectionMode::AccessPointOnly);
        m.poll(200);

        assert!(!m.station().active());
        assert!(!m.is_station_ready());
        assert!(m.access_point().active());
    }

    #[test]
    fn test_mode_change_to_access_point_only_from_both_roles() {
        let mut m = manager(ConnectionMode::AccessPointOnly);
        let (ap_calls, seen) = counter();
        m.register_access_point_hook(move |_: &Identity| seen.set(seen.get() + 1));
        m.poll(0);
        m.set_mode(ConnectionMode::StationWithFallbackAP);
        m.poll(100);
        assert!(m.station().active());
        assert!(m.access_point().active());

        m.set_mode(ConnectionMode::AccessPointOnly);
        m.poll(200);

        assert!(!m.station().active());
        assert!(m.access_point().active());
        assert!(m.access_point().server_initialized());
        assert_eq!(m.radio_mode(), RadioMode::AccessPoint);
        assert_eq!(m.last_fault(), None);
        assert_eq!(ap_calls.get(), 1);
        assert!(m
            .radio()
            .commands()
            .ends_with(&[
                RadioCommand::DisconnectStation { full: true },
                RadioCommand::SetMode(RadioMode::AccessPoint),
            ]));

        // Settled: further polls issue nothing.
        let issued = m.radio().commands().len();
        m.poll(300);
        assert_eq!(m.radio().commands().len(), issued);
    }

    // ==================== Peer Yield Tests ====================

    fn dual_with_both_roles() -> ConnectionManager<SimRadio> {
        let mut m = manager(ConnectionMode::AccessPointOnly);
        m.poll(0);
        m.set_mode(ConnectionMode::StationWithFallbackAP);
        m.poll(100);
        m
    }

    fn station_disconnects(m: &ConnectionManager<SimRadio>) -> usize {
        m.radio()
            .commands()
            .iter()
            .filter(|c| **c == RadioCommand::DisconnectStation { full: false })
            .count()
    }

    #[test]
    fn test_peer_yield_drops_pending_station() {
        let mut m = dual_with_both_roles();
        m.radio_mut().set_peers(1);
        m.poll(200);
        assert_eq!(station_disconnects(&m), 1);

        // Same count: no new decision.
        m.poll(300);
        assert_eq!(station_disconnects(&m), 1);
        assert_eq!(m.snapshot().ap_peers, 1);
    }

    #[test]
    fn test_peer_yield_can_be_disabled() {
        let mut m = manager(ConnectionMode::AccessPointOnly);
        m.policy.yield_to_ap_peers = false;
        m.poll(0);
        m.set_mode(ConnectionMode::StationWithFallbackAP);
        m.poll(100);

        m.radio_mut().set_peers(2);
        m.poll(200);
        assert_eq!(station_disconnects(&m), 0);
    }

    #[test]
    fn test_peer_yield_ignores_departing_peers() {
        let mut m = dual_with_both_roles();
        m.radio_mut().set_peers(1);
        m.poll(200);
        m.radio_mut().set_peers(0);
        m.poll(300);
        assert_eq!(station_disconnects(&m), 1);
    }

    #[test]
    fn test_peer_sample_forgotten_when_ap_torn_down() {
        let mut m = dual_with_both_roles();
        m.radio_mut().set_peers(1);
        m.radio_mut().set_network_available(true);
        m.poll(200);
        assert!(m.is_station_ready());
        assert!(!m.access_point().active());
        assert_eq!(m.snapshot().ap_peers, 0);
        assert_eq!(station_disconnects(&m), 0);

        // Lose the link and fail until the fallback AP reopens with the
        // same single client attached.
        m.radio_mut().set_network_available(false);
        m.poll(300);
        for i in 1..=4u32 {
            m.poll(300 + i * 18_001);
        }
        m.poll(300 + 4 * 18_001 + 1);
        assert!(m.access_point().active());

        m.poll(300 + 4 * 18_001 + 2);
        assert_eq!(station_disconnects(&m), 1);
        assert_eq!(m.snapshot().ap_peers, 1);
    }

    // ==================== Forced Reconnect Tests ====================

    #[test]
    fn test_reconnect_drain_resets_and_stops() {
        let mut m = manager(ConnectionMode::StationOnly);
        m.poll(0);
        m.radio_mut().set_network_available(true);
        m.poll(100);
        run(&mut m, 200, 40_000, 100);
        m.radio_mut().clear_commands();

        m.request_reconnect();
        assert!(m.pending_reconnect());
        m.poll(40_100);

        assert!(!m.pending_reconnect());
        assert_eq!(m.station(), &RoleState::default());
        assert_eq!(m.access_point(), &RoleState::default());
        assert_eq!(
            m.radio().commands(),
            &[
                RadioCommand::DisconnectStation { full: true },
                RadioCommand::SetMode(RadioMode::Off),
            ]
        );

        m.poll(40_200);
        assert!(m.station().active());
        assert_eq!(m.station().last_attempt(), Some(40_200));
    }

    #[test]
    fn test_reconnect_resets_attempt_count() {
        let mut m = manager(ConnectionMode::StationOnly);
        run(&mut m, 0, 40_000, 100);
        assert_eq!(m.station().attempts(), 2);

        m.request_reconnect();
        m.poll(40_100);
        assert_eq!(m.station().attempts(), 0);
        assert_eq!(m.station().last_attempt(), None);
    }

    #[test]
    fn test_reconnect_in_access_point_mode_reopens_ap() {
        let mut m = manager(ConnectionMode::AccessPointOnly);
        let (ap_calls, seen) = counter();
        m.register_access_point_hook(move |_: &Identity| seen.set(seen.get() + 1));
        m.poll(0);

        m.request_reconnect();
        m.poll(100);
        assert!(!m.access_point().active());

        m.poll(200);
        assert!(m.access_point().active());
        assert_eq!(ap_calls.get(), 2);
        // Setup is per boot, not per role activation.
        assert!(m.is_setup_complete());
    }

    #[test]
    fn test_force_reconnect_records_reason() {
        let mut m = manager(ConnectionMode::StationOnly);
        m.force_reconnect(ConnectionFault::ResourceExhaustion);
        assert!(m.pending_reconnect());
        assert_eq!(m.last_fault(), Some(ConnectionFault::ResourceExhaustion));
    }

    // ==================== Accessor Tests ====================

    #[test]
    fn test_identity_accessors() {
        let m = manager(ConnectionMode::StationOnly);
        assert_eq!(m.hostname(), "esp_wificonnect");
        assert_eq!(m.station_ssid(), "HomeNet");
        assert_eq!(m.station_password(), "password123");
        assert_eq!(m.ap_ssid(), "espwific-a1b2c3");
        assert_eq!(m.ap_password(), crate::config::DEFAULT_AP_PASSWORD);
    }

    #[test]
    fn test_last_hook_registration_wins() {
        let mut m = manager(ConnectionMode::StationOnly);
        let (first, first_seen) = counter();
        let (second, second_seen) = counter();
        m.register_station_hook(move |_: &Identity, _: Option<Ipv4Addr>| {
            first_seen.set(first_seen.get() + 1)
        });
        m.register_station_hook(move |_: &Identity, _: Option<Ipv4Addr>| {
            second_seen.set(second_seen.get() + 1)
        });

        m.poll(0);
        m.radio_mut().set_network_available(true);
        m.poll(100);

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn test_snapshot_contains_no_secrets() {
        let mut m = manager(ConnectionMode::StationWithFallbackAP);
        m.poll(0);
        let json = m.snapshot().to_json();

        assert!(json.contains("\"ap_ssid\":\"espwific-a1b2c3\""));
        assert!(json.contains("\"mode\":\"station_with_fallback_ap\""));
        assert!(!json.contains("password123"));
        assert!(!json.contains(crate::config::DEFAULT_AP_PASSWORD));
    }

    #[test]
    fn test_invalid_policy_rejected_at_construction() {
        let mut cfg = config(ConnectionMode::StationOnly);
        cfg.policy.ap_channel = 20;
        let result = ConnectionManager::new(&cfg, &MAC, SimRadio::new());
        assert!(matches!(result, Err(ConfigError::InvalidChannel(20))));
    }
}
