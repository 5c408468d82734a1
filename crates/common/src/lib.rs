//! Shared types for the event-sourced ledger.

mod types;

pub use types::AggregateId;
