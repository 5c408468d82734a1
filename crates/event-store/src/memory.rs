use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, EventStream},
};

/// In-memory event store.
///
/// Holds the global log in a single `Vec` behind a write lock, so appends
/// from different streams never interleave within one batch. Clones share
/// the same log.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns a copy of the whole log in append order.
    pub async fn all_events(&self) -> Vec<EventEnvelope> {
        self.events.read().await.clone()
    }

    fn version_of(log: &[EventEnvelope], aggregate_id: &AggregateId) -> Version {
        log.iter()
            .filter(|e| &e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: EventEnvelope) -> Result<()> {
        tracing::debug!(%event, "event appended");
        self.events.write().await.push(event);
        metrics::counter!("event_store_events_appended_total").increment(1);
        Ok(())
    }

    async fn append_batch(
        &self,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> Result<()> {
        let Some(first) = events.first() else {
            return Ok(());
        };

        let count = events.len() as u64;
        let mut store = self.events.write().await;

        // Checked under the same write lock as the append.
        if let Some(expected) = options.expected_version {
            let actual = Self::version_of(&store, &first.aggregate_id);
            if actual != expected {
                tracing::debug!(%expected, %actual, "append rejected, stream moved");
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: first.aggregate_id.clone(),
                    expected,
                    actual,
                });
            }
        }

        for event in &events {
            tracing::debug!(%event, "event appended");
        }
        store.extend(events);
        metrics::counter!("event_store_events_appended_total").increment(count);
        Ok(())
    }

    async fn events_for(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        Ok(store
            .iter()
            .filter(|e| &e.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    async fn stream_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>> {
        let store = self.events.read().await;
        let version = store
            .iter()
            .filter(|e| &e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max();
        Ok(version)
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.events.read().await.clone();
        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }
}
