//! Stateless repositories — each method takes `&Connection` so callers
//! control transaction boundaries.

pub mod alert;
pub mod assignment;
pub mod location;
pub mod resource;

pub use alert::{AlertRepo, NewAlert};
pub use assignment::AssignmentRepo;
pub use location::LocationRepo;
pub use resource::{ResourceRepo, ResourceWithDistance};
