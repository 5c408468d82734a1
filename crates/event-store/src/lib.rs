//! Append-only event store for the event-sourced ledger.
//!
//! The store is a dumb, trustworthy ledger of [`EventEnvelope`]s: it appends,
//! and it returns each aggregate's events in the order they were appended.

pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
