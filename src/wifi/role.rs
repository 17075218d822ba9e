//! Per-role connection status.

use crate::time::Millis;

/// Status of one radio role.
///
/// Fields are read-only outside the crate; only the connection manager
/// mutates them.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RoleState {
    pub(crate) active: bool,
    pub(crate) server_initialized: bool,
    pub(crate) was_connected: bool,
    pub(crate) last_attempt: Option<Millis>,
    pub(crate) attempts: u8,
}

impl RoleState {
    /// Radio currently configured for this role.
    pub fn active(&self) -> bool {
        self.active
    }

    /// Activation hook invoked and not yet torn down.
    pub fn server_initialized(&self) -> bool {
        self.server_initialized
    }

    /// Role reached a connected state since the last reset.
    pub fn was_connected(&self) -> bool {
        self.was_connected
    }

    /// Time of the last (re)association attempt, `None` if never attempted.
    pub fn last_attempt(&self) -> Option<Millis> {
        self.last_attempt
    }

    /// Consecutive failed attempts since the last success or reset.
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Back to the never-attempted state.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Mark the role's services torn down and the radio released.
    pub(crate) fn deactivate(&mut self) {
        self.active = false;
        self.server_initialized = false;
    }

    pub(crate) fn record_attempt(&mut self, now: Millis) {
        self.last_attempt = Some(now);
    }

    pub(crate) fn record_failure(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// `server_initialized` must imply `active`.
    pub(crate) fn is_consistent(&self) -> bool {
        !self.server_initialized || self.active
    }
}
