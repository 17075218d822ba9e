//! Activation hooks.
//!
//! Surrounding services (HTTP endpoints, service discovery, update listeners)
//! attach themselves to the connection manager through these traits instead
//! of being hard-wired into it. Hooks run synchronously inside
//! [`ConnectionManager::poll`](super::ConnectionManager::poll) and must return
//! promptly: spawn work, don't do it inline.
//!
//! Closures implement every hook trait:
//!
//! ```ignore
//! manager.register_station_hook(|identity: &Identity, address: Option<Ipv4Addr>| {
//!     log::info!("{} reachable at {:?}", identity.hostname(), address);
//! });
//! ```

use crate::identity::Identity;
use std::net::Ipv4Addr;

/// Invoked once each time the station becomes ready.
pub trait StationHook {
    fn on_station_ready(&mut self, identity: &Identity, address: Option<Ipv4Addr>);
}

/// Invoked once the first time the access point starts serving.
pub trait AccessPointHook {
    fn on_access_point_ready(&mut self, identity: &Identity);
}

/// Services configured exactly once per boot, whichever role comes up first.
pub trait SetupSequence {
    fn run(&mut self, identity: &Identity);
}

impl<F> StationHook for F
where
    F: FnMut(&Identity, Option<Ipv4Addr>),
{
    fn on_station_ready(&mut self, identity: &Identity, address: Option<Ipv4Addr>) {
        self(identity, address)
    }
}

impl<F> AccessPointHook for F
where
    F: FnMut(&Identity),
{
    fn on_access_point_ready(&mut self, identity: &Identity) {
        self(identity)
    }
}

impl<F> SetupSequence for F
where
    F: FnMut(&Identity),
{
    fn run(&mut self, identity: &Identity) {
        self(identity)
    }
}
