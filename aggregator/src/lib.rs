//! Concurrent aggregation of per-hut data from the upstream reservation
//! service.
//!
//! Given an authenticated [`ReservationApi`] handle, the [`Aggregator`]
//! fetches the facility listing, fans out bounded-concurrency detail and
//! availability lookups per facility, and merges the results into a single
//! order-preserving response. Partial upstream failure degrades only the
//! affected entries; an authentication rejection triggers a one-time
//! session-invalidation signal without failing sibling lookups.

pub mod availability;
pub mod client;
pub mod config;
pub mod engine;
pub mod errors;
pub mod metrics_defs;
pub mod protocol;

pub use client::{ApiError, HttpReservationClient, ReservationApi};
pub use config::AggregatorConfig;
pub use engine::{AggregateQuery, Aggregator, InvalidationSink};
pub use errors::AggregateError;
pub use protocol::{AttrMap, CapacityDay, StayWindow, WindowError};
