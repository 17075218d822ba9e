//! Device identity derivation.
//!
//! Every name the radio advertises is computed once from the configured
//! device name and the hardware (MAC) address:
//!
//! 1. Underscores are removed and the name is lowercased.
//! 2. The result is truncated, or padded with `'0'`, to exactly 8 characters.
//!    This short name is the human-readable service description.
//! 3. A hyphen and the lowercase hex of the last 3 MAC bytes are appended to
//!    form the access-point SSID.
//!
//! # Example
//!
//! ```
//! use wificonnect_esp32::identity::{derive_ap_ssid, derive_description};
//!
//! let mac = [0x24, 0x0a, 0xc4, 0xa1, 0xb2, 0xc3];
//! assert_eq!(derive_description("esp_wificonnect").unwrap(), "espwific");
//! assert_eq!(derive_ap_ssid("esp_wificonnect", &mac).unwrap(), "espwific-a1b2c3");
//! ```

use crate::config::{
    bounded, ConfigError, Credentials, Hostname, NetworkConfig, Passphrase, Ssid, MAX_SSID_LEN,
};
use std::fmt::Write;

/// Length of the normalized short name.
pub const DESCRIPTION_LEN: usize = 8;

/// Character used to pad names shorter than [`DESCRIPTION_LEN`].
pub const DESCRIPTION_PAD: char = '0';

/// Hex characters in the unique-id suffix (3 MAC bytes).
pub const UNIQUE_SUFFIX_LEN: usize = 6;

/// Hex characters in the full escaped MAC.
pub const ESCAPED_MAC_LEN: usize = 12;

/// A 6-byte hardware (MAC) address.
pub type HardwareId = [u8; 6];

/// The 8-character service description.
pub type Description = heapless::String<DESCRIPTION_LEN>;

/// The 6-character unique-id suffix.
pub type UniqueSuffix = heapless::String<UNIQUE_SUFFIX_LEN>;

/// The 12-character escaped MAC.
pub type EscapedMac = heapless::String<ESCAPED_MAC_LEN>;

/// Normalize a device name into the 8-character description.
pub fn derive_description(name: &str) -> Result<Description, ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::HostnameEmpty);
    }
    let normalized: String = name
        .chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .chain(std::iter::repeat(DESCRIPTION_PAD))
        .take(DESCRIPTION_LEN)
        .collect();
    // Eight characters fit only when they are ASCII.
    bounded(&normalized, "description")
}

/// Lowercase hex of the last three hardware-id bytes.
pub fn unique_suffix(mac: &HardwareId) -> UniqueSuffix {
    let mut out = UniqueSuffix::new();
    for byte in &mac[3..] {
        // Capacity is exactly 3 bytes * 2 hex chars.
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Lowercase hex of the whole hardware id without separators.
pub fn escaped_mac(mac: &HardwareId) -> EscapedMac {
    let mut out = EscapedMac::new();
    for byte in mac {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Access-point SSID: `<description>-<suffix>`.
pub fn derive_ap_ssid(name: &str, mac: &HardwareId) -> Result<Ssid, ConfigError> {
    let description = derive_description(name)?;
    let suffix = unique_suffix(mac);
    let mut ssid: Ssid = bounded(&description, "ap_ssid")?;
    ssid.push('-').map_err(|_| ConfigError::FieldTooLong {
        field: "ap_ssid",
        len: description.len() + 1,
        max: MAX_SSID_LEN,
    })?;
    ssid.push_str(&suffix).map_err(|_| ConfigError::FieldTooLong {
        field: "ap_ssid",
        len: description.len() + 1 + suffix.len(),
        max: MAX_SSID_LEN,
    })?;
    Ok(ssid)
}

/// Names and secrets used for every radio call. Immutable once built.
#[derive(Clone)]
pub struct Identity {
    hostname: Hostname,
    station: Credentials,
    ap_ssid: Ssid,
    ap_password: Passphrase,
    description: Description,
    unique_suffix: UniqueSuffix,
    escaped_mac: EscapedMac,
}

impl Identity {
    /// Derive the identity from configuration and the hardware id.
    pub fn derive(config: &NetworkConfig, mac: &HardwareId) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            hostname: config.name.clone(),
            station: config.station.clone(),
            ap_ssid: derive_ap_ssid(&config.name, mac)?,
            ap_password: config.ap_password.clone(),
            description: derive_description(&config.name)?,
            unique_suffix: unique_suffix(mac),
            escaped_mac: escaped_mac(mac),
        })
    }

    /// Station hostname.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// SSID of the network to join.
    pub fn station_ssid(&self) -> &str {
        self.station.ssid()
    }

    /// Passphrase of the network to join.
    pub fn station_password(&self) -> &str {
        self.station.password()
    }

    /// Derived SSID of the local access point.
    pub fn ap_ssid(&self) -> &str {
        &self.ap_ssid
    }

    /// Passphrase of the local access point.
    pub fn ap_password(&self) -> &str {
        &self.ap_password
    }

    /// 8-character service description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// 6-character unique-id suffix.
    pub fn unique_suffix(&self) -> &str {
        &self.unique_suffix
    }

    /// Full hardware id as 12 lowercase hex characters.
    pub fn escaped_mac(&self) -> &str {
        &self.escaped_mac
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("hostname", &self.hostname)
            .field("station_ssid", &self.station.ssid())
            .field("ap_ssid", &self.ap_ssid)
            .field("description", &self.description)
            .field("escaped_mac", &self.escaped_mac)
            .finish_non_exhaustive()
    }
}
