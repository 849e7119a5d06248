//! # lifeline-core
//!
//! Foundation types for the lifeline dispatch relay:
//!
//! - **Geo primitives**: validated coordinates and Haversine distance
//! - **Domain records**: location updates, emergency alerts, resources,
//!   assignments, and their lifecycle status enums
//! - **Wire protocol**: the tagged inbound message set and outbound event
//!   constructors shared by the relay and its clients

#![deny(unsafe_code)]

pub mod geo;
pub mod protocol;
pub mod types;

pub use geo::GeoPoint;
pub use protocol::{parse_inbound, InboundMessage, OutboundEvent, ProtocolError};
pub use types::{
    AlertSeverity, AlertStatus, AssignmentStatus, ClientRole, EmergencyAlert, LocationUpdate,
    Resource, ResourceAssignment, ResourceStatus,
};
