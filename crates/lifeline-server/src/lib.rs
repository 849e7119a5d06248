//! # lifeline-server
//!
//! The relay itself:
//!
//! - **WebSocket layer**: identity-bound connections, a registry with
//!   heartbeat liveness, and fan-out of location and emergency events
//! - **REST surface**: thin dispatcher endpoints over the store that emit
//!   the same outbound events as the relay
//! - **Operational plumbing**: `/health`, Prometheus `/metrics`, and a
//!   cancellation-token shutdown coordinator

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod ws;

pub use config::ServerConfig;
pub use server::{AppState, RelayServer};
pub use shutdown::ShutdownCoordinator;
pub use ws::connection::{ClientConnection, ClientIdentity};
pub use ws::registry::ConnectionRegistry;
