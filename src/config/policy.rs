//! Connection mode and retry/fallback policy.

use super::credentials::ConfigError;
use crate::time::Millis;
use std::fmt;

/// Interval between station association attempts.
pub const DEFAULT_RETRY_INTERVAL_MS: Millis = 18_000;

/// Failed attempts tolerated in dual mode before opening the fallback AP.
pub const DEFAULT_FALLBACK_THRESHOLD: u8 = 3;

/// Default 2.4GHz access-point channel.
pub const DEFAULT_AP_CHANNEL: u8 = 1;

/// Highest 2.4GHz channel usable worldwide.
pub const MAX_AP_CHANNEL: u8 = 13;

/// Which radio roles the device should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// Join an existing network only.
    StationOnly,
    /// Join an existing network, opening a local AP after repeated failures.
    #[default]
    #[serde(rename = "station_with_fallback_ap")]
    StationWithFallbackAP,
    /// Serve a local access point only.
    AccessPointOnly,
}

impl ConnectionMode {
    /// Short form used in configuration strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StationOnly => "sta",
            Self::StationWithFallbackAP => "sta_ap",
            Self::AccessPointOnly => "ap",
        }
    }

    /// Whether this mode ever attempts station association.
    pub fn needs_station(&self) -> bool {
        matches!(self, Self::StationOnly | Self::StationWithFallbackAP)
    }

    /// Whether both roles may be up at the same time.
    pub fn is_dual(&self) -> bool {
        matches!(self, Self::StationWithFallbackAP)
    }
}

impl std::str::FromStr for ConnectionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sta" | "station" => Ok(Self::StationOnly),
            "sta_ap" | "station_ap" | "fallback" => Ok(Self::StationWithFallbackAP),
            "ap" | "access_point" => Ok(Self::AccessPointOnly),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tunables for the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPolicy {
    /// Minimum time between station association attempts.
    pub retry_interval_ms: Millis,
    /// Dual mode opens the fallback AP once attempts exceed this count.
    pub fallback_threshold: u8,
    /// Channel for the local access point.
    pub ap_channel: u8,
    /// Hide the access-point SSID from beacons.
    pub ap_hidden: bool,
    /// Drop a pending station attempt while clients are using the local AP.
    ///
    /// Stations and the soft-AP share one radio; an unsuccessful association
    /// keeps hopping channels and starves the AP clients of airtime.
    pub yield_to_ap_peers: bool,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            fallback_threshold: DEFAULT_FALLBACK_THRESHOLD,
            ap_channel: DEFAULT_AP_CHANNEL,
            ap_hidden: false,
            yield_to_ap_peers: true,
        }
    }
}

impl ConnectionPolicy {
    /// Validate policy values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_interval_ms == 0 {
            return Err(ConfigError::InvalidPolicy("retry_interval_ms must be > 0"));
        }
        // Half the clock range keeps wrapping differences unambiguous.
        if self.retry_interval_ms > Millis::MAX / 2 {
            return Err(ConfigError::InvalidPolicy(
                "retry_interval_ms must be < half the clock range",
            ));
        }
        if self.fallback_threshold == u8::MAX {
            return Err(ConfigError::InvalidPolicy(
                "fallback_threshold must be < 255",
            ));
        }
        if self.ap_channel == 0 || self.ap_channel > MAX_AP_CHANNEL {
            return Err(ConfigError::InvalidChannel(self.ap_channel));
        }
        Ok(())
    }
}
