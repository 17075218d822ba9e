//! Connectivity configuration.
//!
//! # Components
//!
//! - [`credentials`] - SSID, passphrase and hostname validation
//! - [`policy`] - connection mode and retry/fallback tunables
//!
//! Configuration is supplied once at construction. The binaries build it from
//! compile-time environment variables:
//!
//! ```bash
//! WIFI_SSID="MyNetwork" WIFI_PASSWORD="secret" WIFI_MODE=sta_ap cargo build
//! ```

mod credentials;
mod policy;

pub use credentials::{
    parse_hostname, parse_ssid, validate_password, ConfigError, Credentials, Hostname,
    Passphrase, Ssid, MAX_HOSTNAME_LEN, MAX_PASSWORD_LEN, MAX_SSID_LEN, MIN_PASSWORD_LEN,
};
pub(crate) use credentials::bounded;
pub use policy::{
    ConnectionMode, ConnectionPolicy, DEFAULT_AP_CHANNEL, DEFAULT_FALLBACK_THRESHOLD,
    DEFAULT_RETRY_INTERVAL_MS, MAX_AP_CHANNEL,
};

use zeroize::Zeroizing;

/// Device name used as hostname and as the AP name prefix.
pub const DEFAULT_DEVICE_NAME: &str = "esp_wificonnect";

/// Passphrase of the fallback access point.
pub const DEFAULT_AP_PASSWORD: &str = "adsap1234";

/// Placeholder station SSID used when none is configured.
pub const DEFAULT_STATION_SSID: &str = "routeur-ssid";

/// Placeholder station passphrase used when none is configured.
pub const DEFAULT_STATION_PASSWORD: &str = "routeur-pswd";

/// Everything the connection manager needs at construction.
#[derive(Clone)]
pub struct NetworkConfig {
    /// Device name: station hostname and source of the AP name.
    pub name: Hostname,
    /// Credentials of the network to join.
    pub station: Credentials,
    /// Passphrase of the local access point (empty for open).
    pub ap_password: Passphrase,
    /// Initial connection mode.
    pub mode: ConnectionMode,
    /// Retry and fallback tunables.
    pub policy: ConnectionPolicy,
}

impl NetworkConfig {
    /// Create a configuration with default mode, policy and AP passphrase.
    pub fn new(name: &str, station: Credentials) -> Result<Self, ConfigError> {
        Ok(Self {
            name: parse_hostname(name)?,
            station,
            ap_password: Zeroizing::new(DEFAULT_AP_PASSWORD.to_string()),
            mode: ConnectionMode::default(),
            policy: ConnectionPolicy::default(),
        })
    }

    /// Replace the access-point passphrase.
    pub fn with_ap_password(mut self, password: &str) -> Result<Self, ConfigError> {
        validate_password(password)?;
        self.ap_password = Zeroizing::new(password.to_string());
        Ok(self)
    }

    /// Replace the initial connection mode.
    pub fn with_mode(mut self, mode: ConnectionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the policy after validating it.
    pub fn with_policy(mut self, policy: ConnectionPolicy) -> Result<Self, ConfigError> {
        policy.validate()?;
        self.policy = policy;
        Ok(self)
    }

    /// Re-check every field. Fields are public, so callers that mutate them
    /// directly should validate before handing the config over.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_hostname(&self.name)?;
        parse_ssid(self.station.ssid())?;
        validate_password(self.station.password())?;
        validate_password(&self.ap_password)?;
        self.policy.validate()
    }

    /// Build from compile-time environment.
    ///
    /// Reads `WIFI_HOSTNAME`, `WIFI_SSID`, `WIFI_PASSWORD`, `WIFI_AP_PASSWORD`
    /// and `WIFI_MODE`; unset variables fall back to the defaults above.
    pub fn from_build_env() -> Result<Self, ConfigError> {
        Self::from_values(
            option_env!("WIFI_HOSTNAME"),
            option_env!("WIFI_SSID"),
            option_env!("WIFI_PASSWORD"),
            option_env!("WIFI_AP_PASSWORD"),
            option_env!("WIFI_MODE"),
        )
    }

    /// Build from optional string values, applying defaults for `None`.
    pub fn from_values(
        hostname: Option<&str>,
        ssid: Option<&str>,
        password: Option<&str>,
        ap_password: Option<&str>,
        mode: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let station = Credentials::new(
            ssid.unwrap_or(DEFAULT_STATION_SSID),
            password.unwrap_or(DEFAULT_STATION_PASSWORD),
        )?;
        let mode = match mode {
            Some(m) => m.parse()?,
            None => ConnectionMode::default(),
        };
        Self::new(hostname.unwrap_or(DEFAULT_DEVICE_NAME), station)?
            .with_ap_password(ap_password.unwrap_or(DEFAULT_AP_PASSWORD))
            .map(|config| config.with_mode(mode))
    }
}

impl std::fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("name", &self.name)
            .field("station", &self.station)
            .field("ap_password", &"****")
            .field("mode", &self.mode)
            .field("policy", &self.policy)
            .finish()
    }
}
