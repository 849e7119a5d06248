//! High-level store facade over the `SQLite` backend.

pub mod dispatch_store;
