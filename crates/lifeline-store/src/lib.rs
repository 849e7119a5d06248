//! # lifeline-store
//!
//! The persistence collaborator for the dispatch relay:
//!
//! - **`SQLite` backend**: `r2d2` connection pool with WAL mode and foreign
//!   keys, version-tracked embedded migrations
//! - **Repositories**: stateless structs, every method takes `&Connection`
//! - **[`DispatchStore`]**: the high-level API the relay and REST layer call —
//!   multi-row writes run inside a single transaction so callers never
//!   observe partial state

#![deny(unsafe_code)]

pub mod errors;
pub mod sqlite;
pub mod store;

pub use errors::{Result, StoreError};
pub use sqlite::connection::{new_file, new_in_memory, ConnectionConfig, ConnectionPool};
pub use sqlite::migrations::run_migrations;
pub use store::dispatch_store::{CreateAlertOptions, DispatchStore, NearbyResource};
