//! WebSocket layer — identity-bound connections, the registry, heartbeat
//! liveness, message relay, and session lifecycle.

pub mod connection;
pub mod heartbeat;
pub mod registry;
pub mod relay;
pub mod session;
