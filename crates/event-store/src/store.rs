use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Version};

/// Options for appending a batch of events.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOptions {
    /// Version the stream must be at for the append to go through.
    /// If None, no version check is performed.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the stream to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the stream to be empty.
    pub fn expect_new() -> Self {
        Self::expect_version(Version::initial())
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Core trait for event store implementations.
///
/// An event store is an append-only ledger. It performs no business
/// validation: deciding which events may be produced is the aggregate's job.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a single event to the end of the log.
    ///
    /// A failed append must leave the log unchanged so the caller can retry.
    async fn append(&self, event: EventEnvelope) -> Result<()>;

    /// Appends several events of one stream, preserving their order.
    ///
    /// If `options.expected_version` is set and the stream is at another
    /// version, nothing is appended and the call fails with
    /// [`EventStoreError::ConcurrencyConflict`].
    ///
    /// The default implementation checks the version and then appends one
    /// event at a time, so neither step is atomic: a failure part-way through
    /// leaves a prefix of the batch in the log. Backends that can do better
    /// should override this and check and append under one lock.
    async fn append_batch(
        &self,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> Result<()> {
        let Some(first) = events.first() else {
            return Ok(());
        };

        if let Some(expected) = options.expected_version {
            let actual = self
                .stream_version(&first.aggregate_id)
                .await?
                .unwrap_or_default();
            if actual != expected {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: first.aggregate_id.clone(),
                    expected,
                    actual,
                });
            }
        }

        for event in events {
            self.append(event).await?;
        }
        Ok(())
    }

    /// Retrieves all events for a specific aggregate, in append order.
    ///
    /// An unknown aggregate yields an empty vector, never an error.
    async fn events_for(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>>;

    /// Gets the highest version recorded for an aggregate.
    ///
    /// Returns None if the aggregate has no events.
    async fn stream_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>>;

    /// Streams every event in the store in append order.
    async fn stream_all_events(&self) -> Result<EventStream>;
}

/// Extension trait providing convenience methods for event stores.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Checks if an aggregate exists (has any events).
    async fn aggregate_exists(&self, aggregate_id: &AggregateId) -> Result<bool> {
        Ok(self.stream_version(aggregate_id).await?.is_some())
    }

    /// Counts the events recorded for an aggregate.
    async fn event_count_for(&self, aggregate_id: &AggregateId) -> Result<usize> {
        Ok(self.events_for(aggregate_id).await?.len())
    }
}

// Blanket implementation for all EventStore implementations
impl<T: EventStore + ?Sized> EventStoreExt for T {}
