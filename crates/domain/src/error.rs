//! Domain error types.

use common::AggregateId;
use event_store::{EventId, EventStoreError, Version};
use thiserror::Error;

use crate::account::AccountError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A command was rejected by the account aggregate. Nothing was recorded.
    #[error("Command rejected: {0}")]
    Validation(#[from] AccountError),

    /// An aggregate's history could not be replayed.
    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// An error occurred in the event store. Uncommitted events are kept.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The in-memory aggregate is out of step with its stream in the store.
    #[error("Concurrency conflict on {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },
}

/// A stored event stream that cannot be replayed.
///
/// Any of these means the store is corrupt or was written by an incompatible
/// version of the code. Replay stops at the first one.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The event type is not one this aggregate knows how to apply.
    #[error("Unrecognized event type {event_type} at version {version} of {aggregate_id}")]
    UnrecognizedEvent {
        aggregate_id: AggregateId,
        event_type: String,
        version: Version,
    },

    /// The event type is known but its payload does not decode.
    #[error("Malformed {event_type} payload at version {version} of {aggregate_id}: {source}")]
    MalformedPayload {
        aggregate_id: AggregateId,
        event_type: String,
        version: Version,
        source: serde_json::Error,
    },

    /// The event belongs to a different aggregate stream.
    #[error("Event {event_id} belongs to {found}, not {expected}")]
    ForeignEvent {
        event_id: EventId,
        expected: AggregateId,
        found: AggregateId,
    },

    /// The event was recorded for a different kind of aggregate.
    #[error("Event {event_id} was recorded for aggregate type {found}, expected {expected}")]
    AggregateTypeMismatch {
        event_id: EventId,
        expected: &'static str,
        found: String,
    },

    /// The event cannot follow the state built from the events before it.
    #[error("Invalid {event_type} at version {version} of {aggregate_id}: {reason}")]
    InvalidEvent {
        aggregate_id: AggregateId,
        event_type: String,
        version: Version,
        reason: String,
    },

    /// The stream has a gap or a repeated version.
    #[error("Out of sequence event for {aggregate_id}: expected version {expected}, found {found}")]
    OutOfSequence {
        aggregate_id: AggregateId,
        expected: Version,
        found: Version,
    },
}
