//! # pollbox-core
//!
//! Domain logic for the pollbox anonymous polling service.
//!
//! The crate defines the domain model, the [`PollStore`] contract every
//! storage backend implements, and the [`PollService`] that enforces the
//! voting rules on top of it: one vote per visitor per poll, no votes on
//! expired polls, percentages always recomputed from raw counters.
//!
//! An in-memory backend ([`memory::MemoryStore`]) ships alongside the
//! contract so the service can be exercised without a database file.

pub mod aggregate;
pub mod memory;
pub mod model;
pub mod service;
pub mod store;
pub mod validate;

mod error;

pub use error::{PollError, Result};
pub use model::*;
pub use service::PollService;
pub use store::PollStore;
