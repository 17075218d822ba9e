//! Runtime faults absorbed by the state machine.
//!
//! None of these is ever returned to a caller. They are logged, recorded as
//! the manager's last fault for diagnostics, and answered by retrying,
//! reconnecting or falling back to the local access point.

use std::fmt;

/// Faults observed while managing the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionFault {
    /// Station did not associate within the retry interval.
    AssociationTimeout,
    /// Free memory stayed below the safety threshold; reconnect forced.
    ResourceExhaustion,
    /// Role state broke its invariants. A contract violation, not a
    /// recoverable condition.
    RoleConflict,
}

impl ConnectionFault {
    /// Stable identifier for logs and the status endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssociationTimeout => "association_timeout",
            Self::ResourceExhaustion => "resource_exhaustion",
            Self::RoleConflict => "role_conflict",
        }
    }
}

impl fmt::Display for ConnectionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
