//! stayd — availability engine for rentable units.
//!
//! One augmented interval search tree per unit answers "does this date range
//! overlap a confirmed booking" in logarithmic expected time. A TTL cache
//! with explicit invalidation keeps trees consistent with persisted state,
//! and a check → authoritative re-check → commit protocol closes the race
//! between an in-memory overlap check and a durable write. Persistence is an
//! abstract collaborator; the HTTP layer that maps the engine's surface onto
//! endpoints lives outside this crate.

pub mod cache;
pub mod config;
pub mod engine;
pub mod model;
pub mod observability;
pub mod store;
pub mod tree;

pub use engine::{AvailabilityEngine, EngineError};
pub use model::{Availability, BookingReceipt, BookingRecord, ConflictInfo, DateRange};
