//! Services attached to the connection through activation hooks.
//!
//! - [`StatusServer`] - `/status` JSON endpoint for diagnostics

mod status_server;

pub use status_server::{
    attach_status_server, StatusBoard, StatusServer, StatusServerHook, DEFAULT_STATUS_PORT,
};
