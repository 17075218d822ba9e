//! HTTP status endpoint.
//!
//! Serves the latest [`ConnectionSnapshot`] as JSON on `/status`. Uses
//! `tiny_http`, which works on both host and ESP32 (via std::net).
//!
//! # Example Response
//!
//! ```json
//! {
//!   "uptime_secs": 3600,
//!   "connection": {
//!     "mode": "station_with_fallback_ap",
//!     "radio_mode": "station",
//!     "station_ready": true,
//!     "ap_ssid": "espwific-a1b2c3",
//!     "...": "..."
//!   }
//! }
//! ```

use crate::identity::Identity;
use crate::wifi::{AccessPointHook, ConnectionManager, ConnectionSnapshot, RadioDriver, StationHook};
use log::{error, info, warn};
use std::cell::RefCell;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};
use tiny_http::{Method, Response, Server};

/// Default port for the status server.
pub const DEFAULT_STATUS_PORT: u16 = 8080;

/// Latest published connection state, shared with the server thread.
#[derive(Debug)]
pub struct StatusBoard {
    start_time: Instant,
    snapshot: RwLock<Option<ConnectionSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            snapshot: RwLock::new(None),
        }
    }

    /// Replace the published snapshot.
    pub fn publish(&self, snapshot: ConnectionSnapshot) {
        let mut slot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(snapshot);
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Serialize uptime and the latest snapshot to JSON.
    pub fn to_json(&self) -> String {
        let slot = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        let body = serde_json::json!({
            "uptime_secs": self.uptime_secs(),
            "connection": &*slot,
        });
        body.to_string()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP status server.
///
/// Runs in a background thread. Drop it to stop the server.
pub struct StatusServer {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
}

impl StatusServer {
    /// Start the status server.
    ///
    /// `bind_addr` of `None` listens on all interfaces.
    pub fn start(
        bind_addr: Option<IpAddr>,
        port: u16,
        board: Arc<StatusBoard>,
    ) -> Result<Self, std::io::Error> {
        let ip = bind_addr.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let addr = SocketAddr::new(ip, port);

        let server = Server::http(addr)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::AddrInUse, format!("{}", e)))?;
        let local_addr = server.server_addr().to_ip();

        info!(
            "Status server listening on http://{}/status",
            local_addr.unwrap_or(addr)
        );

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let handle = thread::spawn(move || {
            Self::run_server(server, board, shutdown_clone);
        });

        Ok(Self {
            handle: Some(handle),
            shutdown,
            local_addr,
        })
    }

    /// Address actually bound, useful with port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn run_server(server: Server, board: Arc<StatusBoard>, shutdown: Arc<AtomicBool>) {
        let content_type =
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("static header");
        let location =
            tiny_http::Header::from_bytes(&b"Location"[..], &b"/status"[..]).expect("static header");
        let allow_get =
            tiny_http::Header::from_bytes(&b"Allow"[..], &b"GET"[..]).expect("static header");

        loop {
            if shutdown.load(Ordering::Acquire) {
                info!("Status server shutting down");
                break;
            }

            match server.recv_timeout(Duration::from_millis(100)) {
                Ok(Some(request)) => {
                    if request.method() != &Method::Get {
                        let response = Response::from_string("Method Not Allowed")
                            .with_status_code(405)
                            .with_header(allow_get.clone());
                        let _ = request.respond(response);
                        continue;
                    }

                    let path = request.url().to_string();
                    let result = match path.as_str() {
                        "/status" | "/status/" => {
                            let response = Response::from_string(board.to_json())
                                .with_header(content_type.clone())
                                .with_status_code(200);
                            request.respond(response)
                        }
                        "/" => {
                            let response = Response::from_string("See /status")
                                .with_status_code(302)
                                .with_header(location.clone());
                            request.respond(response)
                        }
                        _ => request.respond(Response::from_string("Not Found").with_status_code(404)),
                    };

                    if let Err(e) = result {
                        warn!("Failed to send response: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Status server error: {}", e);
                    break;
                }
            }
        }
    }

    /// Stop the server. May take up to 100ms due to the polling interval.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for StatusServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts the status server the first time any role comes up.
///
/// A failed bind is logged and retried on the next activation.
#[derive(Clone)]
pub struct StatusServerHook {
    board: Arc<StatusBoard>,
    port: u16,
    server: Rc<RefCell<Option<StatusServer>>>,
}

impl StatusServerHook {
    pub fn new(board: Arc<StatusBoard>, port: u16) -> Self {
        Self {
            board,
            port,
            server: Rc::new(RefCell::new(None)),
        }
    }

    /// Whether the server thread is running.
    pub fn is_running(&self) -> bool {
        self.server.borrow().is_some()
    }

    /// Bound address, once running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.borrow().as_ref().and_then(StatusServer::local_addr)
    }

    fn ensure_started(&self, identity: &Identity) {
        let mut slot = self.server.borrow_mut();
        if slot.is_some() {
            return;
        }
        match StatusServer::start(None, self.port, self.board.clone()) {
            Ok(server) => {
                info!("Status available for {}", identity.hostname());
                *slot = Some(server);
            }
            Err(e) => warn!("Failed to start status server: {}", e),
        }
    }
}

impl StationHook for StatusServerHook {
    fn on_station_ready(&mut self, identity: &Identity, _address: Option<Ipv4Addr>) {
        self.ensure_started(identity);
    }
}

impl AccessPointHook for StatusServerHook {
    fn on_access_point_ready(&mut self, identity: &Identity) {
        self.ensure_started(identity);
    }
}

/// Register a [`StatusServerHook`] for both roles and return it.
pub fn attach_status_server<R: RadioDriver>(
    manager: &mut ConnectionManager<R>,
    board: Arc<StatusBoard>,
    port: u16,
) -> StatusServerHook {
    let hook = StatusServerHook::new(board, port);
    manager.register_station_hook(hook.clone());
    manager.register_access_point_hook(hook.clone());
    hook
}
