//! WiFi credentials and name validation.
//!
//! Platform-independent, so every rule here is testable on the host.
//!
//! # Example
//!
//! ```
//! use wificonnect_esp32::config::{ConfigError, Credentials};
//!
//! let creds = Credentials::new("MyNetwork", "MyPassword").unwrap();
//! assert_eq!(creds.ssid(), "MyNetwork");
//!
//! assert_eq!(Credentials::new("", "MyPassword"), Err(ConfigError::SsidEmpty));
//! ```

use std::fmt;
use zeroize::Zeroizing;

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum password length for WPA2.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Minimum password length for WPA2.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum hostname length accepted by the ESP-IDF netif layer.
pub const MAX_HOSTNAME_LEN: usize = 32;

/// Bounded SSID storage.
pub type Ssid = heapless::String<MAX_SSID_LEN>;

/// Bounded hostname storage.
pub type Hostname = heapless::String<MAX_HOSTNAME_LEN>;

/// A WPA2 passphrase, wiped from memory on drop.
pub type Passphrase = Zeroizing<String>;

/// Copy `value` into a bounded string, reporting overflow instead of truncating.
pub(crate) fn bounded<const N: usize>(
    value: &str,
    field: &'static str,
) -> Result<heapless::String<N>, ConfigError> {
    let mut out = heapless::String::new();
    out.push_str(value).map_err(|_| ConfigError::FieldTooLong {
        field,
        len: value.len(),
        max: N,
    })?;
    Ok(out)
}

/// Validate a WPA2 passphrase. Empty means an open network.
pub fn validate_password(password: &str) -> Result<(), ConfigError> {
    if !password.is_empty() && password.len() < MIN_PASSWORD_LEN {
        return Err(ConfigError::PasswordTooShort {
            len: password.len(),
            min: MIN_PASSWORD_LEN,
        });
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(ConfigError::PasswordTooLong {
            len: password.len(),
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Validate an SSID and copy it into bounded storage.
pub fn parse_ssid(ssid: &str) -> Result<Ssid, ConfigError> {
    if ssid.is_empty() {
        return Err(ConfigError::SsidEmpty);
    }
    if ssid.len() > MAX_SSID_LEN {
        return Err(ConfigError::SsidTooLong {
            len: ssid.len(),
            max: MAX_SSID_LEN,
        });
    }
    bounded(ssid, "ssid")
}

/// Validate a hostname and copy it into bounded storage.
///
/// Letters, digits, `-` and `_` are accepted; the underscore is tolerated
/// because the default device name carries one.
pub fn parse_hostname(name: &str) -> Result<Hostname, ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::HostnameEmpty);
    }
    if name.len() > MAX_HOSTNAME_LEN {
        return Err(ConfigError::HostnameTooLong {
            len: name.len(),
            max: MAX_HOSTNAME_LEN,
        });
    }
    if let Some(ch) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(ConfigError::HostnameInvalidChar(ch));
    }
    bounded(name, "hostname")
}

/// Station credentials for joining an existing network.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    ssid: Ssid,
    password: Passphrase,
}

impl Credentials {
    /// Create validated credentials.
    pub fn new(ssid: &str, password: &str) -> Result<Self, ConfigError> {
        let ssid = parse_ssid(ssid)?;
        validate_password(password)?;
        Ok(Self {
            ssid,
            password: Zeroizing::new(password.to_string()),
        })
    }

    /// Credentials for an open network (no password).
    pub fn open(ssid: &str) -> Result<Self, ConfigError> {
        Self::new(ssid, "")
    }

    /// Network SSID.
    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Network passphrase (empty for open networks).
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Check if this is an open network (no password).
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("password", &"****")
            .finish()
    }
}

/// Errors that can occur while building the connectivity configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// SSID is empty.
    SsidEmpty,
    /// SSID exceeds maximum length.
    SsidTooLong { len: usize, max: usize },
    /// Password is too short for WPA2.
    PasswordTooShort { len: usize, min: usize },
    /// Password exceeds maximum length.
    PasswordTooLong { len: usize, max: usize },
    /// Hostname or name prefix is empty.
    HostnameEmpty,
    /// Hostname exceeds maximum length.
    HostnameTooLong { len: usize, max: usize },
    /// Hostname contains a character outside `[A-Za-z0-9_-]`.
    HostnameInvalidChar(char),
    /// A derived or copied value does not fit its bounded buffer.
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    /// Access-point channel outside 1..=13.
    InvalidChannel(u8),
    /// Unknown connection mode string.
    UnknownMode(String),
    /// Policy parameter out of range.
    InvalidPolicy(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidEmpty => write!(f, "SSID cannot be empty"),
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooShort { len, min } => {
                write!(f, "password too short: {} bytes (min {})", len, min)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
            Self::HostnameEmpty => write!(f, "hostname cannot be empty"),
            Self::HostnameTooLong { len, max } => {
                write!(f, "hostname too long: {} bytes (max {})", len, max)
            }
            Self::HostnameInvalidChar(ch) => {
                write!(f, "hostname contains invalid character {:?}", ch)
            }
            Self::FieldTooLong { field, len, max } => {
                write!(f, "{} too long: {} bytes (max {})", field, len, max)
            }
            Self::InvalidChannel(ch) => write!(f, "invalid AP channel {} (1-13)", ch),
            Self::UnknownMode(mode) => write!(f, "unknown connection mode: {}", mode),
            Self::InvalidPolicy(msg) => write!(f, "invalid connection policy: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Credentials Tests ====================

    #[test]
    fn test_valid_credentials() {
        let creds = Credentials::new("TestNetwork", "password123").unwrap();
        assert_eq!(creds.ssid(), "TestNetwork");
        assert_eq!(creds.password(), "password123");
        assert!(!creds.is_open());
    }

    #[test]
    fn test_open_network() {
        let creds = Credentials::open("OpenNetwork").unwrap();
        assert!(creds.is_open());
    }

    #[test]
    fn test_empty_ssid() {
        assert_eq!(
            Credentials::new("", "password123"),
            Err(ConfigError::SsidEmpty)
        );
    }

    #[test]
    fn test_ssid_too_long() {
        let long_ssid = "a".repeat(33);
        let result = Credentials::new(&long_ssid, "password123");
        assert!(matches!(
            result,
            Err(ConfigError::SsidTooLong { len: 33, max: 32 })
        ));
    }

    #[test]
    fn test_ssid_max_length() {
        let max_ssid = "a".repeat(32);
        assert!(Credentials::new(&max_ssid, "password123").is_ok());
    }

    #[test]
    fn test_password_bounds() {
        assert!(matches!(
            Credentials::new("Net", "short"),
            Err(ConfigError::PasswordTooShort { .. })
        ));
        assert!(Credentials::new("Net", "12345678").is_ok());
        assert!(Credentials::new("Net", &"a".repeat(64)).is_ok());
        assert!(matches!(
            Credentials::new("Net", &"a".repeat(65)),
            Err(ConfigError::PasswordTooLong { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("Net", "supersecret").unwrap();
        let dbg = format!("{:?}", creds);
        assert!(dbg.contains("Net"));
        assert!(!dbg.contains("supersecret"));
    }

    // ==================== Hostname Tests ====================

    #[test]
    fn test_hostname_accepts_underscore() {
        let host = parse_hostname("esp_wificonnect").unwrap();
        assert_eq!(host.as_str(), "esp_wificonnect");
    }

    #[test]
    fn test_hostname_rejects_space() {
        assert_eq!(
            parse_hostname("my device"),
            Err(ConfigError::HostnameInvalidChar(' '))
        );
    }

    #[test]
    fn test_hostname_length() {
        assert_eq!(parse_hostname(""), Err(ConfigError::HostnameEmpty));
        assert!(matches!(
            parse_hostname(&"h".repeat(33)),
            Err(ConfigError::HostnameTooLong { .. })
        ));
    }

    // ==================== Bounded Buffer Tests ====================

    #[test]
    fn test_bounded_reports_overflow() {
        let result = bounded::<4>("abcdef", "description");
        assert_eq!(
            result,
            Err(ConfigError::FieldTooLong {
                field: "description",
                len: 6,
                max: 4
            })
        );
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::SsidTooLong { len: 40, max: 32 };
        assert_eq!(err.to_string(), "SSID too long: 40 bytes (max 32)");
        assert_eq!(
            ConfigError::InvalidChannel(14).to_string(),
            "invalid AP channel 14 (1-13)"
        );
    }
}
