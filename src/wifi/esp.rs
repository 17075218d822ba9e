//! ESP-IDF radio driver.
//!
//! Wraps [`EspWifi`] without the blocking adapter: association and DHCP run
//! in the IDF WiFi task and the connection manager polls for the outcome.

use super::radio::{RadioDriver, RadioMode};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};
use esp_idf_sys::{esp, EspError};
use log::{debug, info, warn};
use std::net::Ipv4Addr;

/// Maximum clients on the local access point.
const MAX_AP_CLIENTS: u16 = 4;

/// Errors building a driver configuration.
#[derive(Debug)]
pub enum WifiError {
    /// SSID does not fit the driver's buffer.
    InvalidSsid,
    /// Password does not fit the driver's buffer.
    InvalidPassword,
    /// ESP-IDF error.
    EspError(EspError),
}

impl From<EspError> for WifiError {
    fn from(e: EspError) -> Self {
        Self::EspError(e)
    }
}

impl std::fmt::Display for WifiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "invalid SSID"),
            Self::InvalidPassword => write!(f, "invalid password"),
            Self::EspError(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for WifiError {}

fn auth_for(password: &str) -> AuthMethod {
    if password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    }
}

/// [`RadioDriver`] over the ESP32 WiFi peripheral.
pub struct EspRadio<'a> {
    wifi: EspWifi<'a>,
    mode: RadioMode,
    client: ClientConfiguration,
    access_point: AccessPointConfiguration,
}

impl<'a> EspRadio<'a> {
    /// Take the modem. The radio stays off until the first mode change.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<Self, EspError> {
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        Ok(Self {
            wifi,
            mode: RadioMode::Off,
            client: ClientConfiguration::default(),
            access_point: AccessPointConfiguration::default(),
        })
    }

    /// Factory MAC of the station interface.
    pub fn station_mac(&self) -> Result<[u8; 6], EspError> {
        self.wifi.sta_netif().get_mac()
    }

    fn client_config(ssid: &str, password: &str) -> Result<ClientConfiguration, WifiError> {
        Ok(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| WifiError::InvalidSsid)?,
            password: password.try_into().map_err(|_| WifiError::InvalidPassword)?,
            auth_method: auth_for(password),
            ..Default::default()
        })
    }

    fn access_point_config(
        ssid: &str,
        password: &str,
        channel: u8,
        hidden: bool,
    ) -> Result<AccessPointConfiguration, WifiError> {
        Ok(AccessPointConfiguration {
            ssid: ssid.try_into().map_err(|_| WifiError::InvalidSsid)?,
            password: password.try_into().map_err(|_| WifiError::InvalidPassword)?,
            auth_method: auth_for(password),
            channel,
            ssid_hidden: hidden,
            max_connections: MAX_AP_CLIENTS,
            ..Default::default()
        })
    }

    /// Push the stored configuration for the current mode to the driver.
    fn apply(&mut self) -> Result<(), EspError> {
        let config = match self.mode {
            RadioMode::Off => {
                if self.wifi.is_started()? {
                    self.wifi.stop()?;
                }
                return Ok(());
            }
            RadioMode::Station => Configuration::Client(self.client.clone()),
            RadioMode::AccessPoint => Configuration::AccessPoint(self.access_point.clone()),
            RadioMode::StationAndAccessPoint => {
                Configuration::Mixed(self.client.clone(), self.access_point.clone())
            }
        };
        self.wifi.set_configuration(&config)?;
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }
        Ok(())
    }

    fn try_begin_station(
        &mut self,
        ssid: &str,
        password: &str,
        hostname: &str,
    ) -> Result<(), WifiError> {
        self.client = Self::client_config(ssid, password)?;
        self.apply()?;
        self.wifi.sta_netif_mut().set_hostname(hostname)?;
        self.wifi.connect()?;
        Ok(())
    }

    fn try_configure_access_point(
        &mut self,
        ssid: &str,
        password: &str,
        channel: u8,
        hidden: bool,
    ) -> Result<(), WifiError> {
        self.access_point = Self::access_point_config(ssid, password, channel, hidden)?;
        self.apply()?;
        Ok(())
    }
}

impl RadioDriver for EspRadio<'_> {
    fn begin_station(&mut self, ssid: &str, password: &str, hostname: &str) {
        if let Err(e) = self.try_begin_station(ssid, password, hostname) {
            warn!("Station start failed: {}", e);
        }
    }

    fn disconnect_station(&mut self, full: bool) {
        if let Err(e) = self.wifi.disconnect() {
            debug!("Station disconnect: {:?}", e);
        }
        if full {
            self.client = ClientConfiguration::default();
        }
    }

    fn configure_access_point(&mut self, ssid: &str, password: &str, channel: u8, hidden: bool) {
        match self.try_configure_access_point(ssid, password, channel, hidden) {
            Ok(()) => info!("Access point {} up on channel {}", ssid, channel),
            Err(e) => warn!("Access point start failed: {}", e),
        }
    }

    fn disconnect_access_point(&mut self, full: bool) {
        // The AP interface stops with the next mode change.
        if full {
            self.access_point = AccessPointConfiguration::default();
        }
    }

    fn ap_peer_count(&self) -> u8 {
        if !self.mode.has_access_point() {
            return 0;
        }
        // SAFETY: plain C struct, filled in by the driver.
        let mut list: esp_idf_sys::wifi_sta_list_t = unsafe { core::mem::zeroed() };
        // SAFETY: `list` outlives the call.
        match esp!(unsafe { esp_idf_sys::esp_wifi_ap_get_sta_list(&mut list) }) {
            Ok(()) => u8::try_from(list.num).unwrap_or(u8::MAX),
            Err(_) => 0,
        }
    }

    fn station_associated(&self) -> bool {
        self.mode.has_station()
            && self.wifi.is_connected().unwrap_or(false)
            && self.wifi.is_up().unwrap_or(false)
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        if !self.station_associated() {
            return None;
        }
        self.wifi.sta_netif().get_ip_info().ok().map(|info| info.ip)
    }

    fn set_radio_mode(&mut self, mode: RadioMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        if let Err(e) = self.apply() {
            warn!("Radio mode {:?} failed: {:?}", mode, e);
        }
    }
}
