//! Command execution, commit and replay.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventId, EventStore, EventStoreError, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// One async lock per aggregate identity.
///
/// Commands against the same aggregate are serialized; commands against
/// different aggregates never contend.
#[derive(Default)]
struct AggregateLocks {
    locks: Mutex<HashMap<AggregateId, Arc<tokio::sync::Mutex<()>>>>,
}

impl AggregateLocks {
    fn lock_for(&self, aggregate_id: &AggregateId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(aggregate_id.clone()).or_default().clone()
    }
}

/// Drives commands against aggregates and commits their events.
///
/// The handler is responsible for:
/// 1. Serializing commands per aggregate identity
/// 2. Running a command so the aggregate buffers its events
/// 3. Flushing buffered events to the event store
/// 4. Rebuilding aggregates from their full history
///
/// All writers of a store should share one handler, since the per-identity
/// locks live here.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    locks: AggregateLocks,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
    DomainError: From<A::Error>,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: AggregateLocks::default(),
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuilds an aggregate by replaying every stored event for it.
    ///
    /// An unknown identity yields an aggregate in its zero state. A corrupt
    /// stream fails the whole rebuild.
    #[tracing::instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn rebuild(&self, aggregate_id: &AggregateId) -> Result<A, DomainError> {
        let history = self.store.events_for(aggregate_id).await?;

        let mut aggregate = A::new(aggregate_id.clone());
        if let Err(e) = aggregate.load_from_history(&history) {
            tracing::error!(error = %e, "aggregate history cannot be replayed");
            return Err(e.into());
        }

        metrics::counter!("aggregates_rebuilt_total").increment(1);
        tracing::debug!(version = %aggregate.version(), "aggregate rebuilt");
        Ok(aggregate)
    }

    /// Runs a command against an aggregate held by the caller and commits
    /// the events it produces.
    ///
    /// The aggregate must be up to date with the store; an instance that
    /// missed events appended since it was loaded is rejected with
    /// [`DomainError::ConcurrencyConflict`] before the command runs.
    ///
    /// If the command is rejected nothing is recorded. If the append fails,
    /// the events stay buffered in the aggregate and [`Self::flush`] can be
    /// retried without running the command again.
    #[tracing::instrument(skip(self, aggregate), fields(aggregate_id = %aggregate.id()))]
    pub async fn execute(&self, aggregate: &mut A, command: A::Command) -> Result<(), DomainError> {
        let lock = self.locks.lock_for(aggregate.id());
        let _guard = lock.lock().await;

        self.check_stream(aggregate).await?;
        Self::run(aggregate, command)?;
        self.commit(aggregate).await
    }

    /// Writes the aggregate's uncommitted events to the store.
    ///
    /// Safe to call again after a failure: events that already reached the
    /// store are not appended twice.
    #[tracing::instrument(skip(self, aggregate), fields(aggregate_id = %aggregate.id()))]
    pub async fn flush(&self, aggregate: &mut A) -> Result<(), DomainError> {
        let lock = self.locks.lock_for(aggregate.id());
        let _guard = lock.lock().await;

        self.commit(aggregate).await
    }

    /// Rebuilds an aggregate, runs a command against it and commits, all
    /// while holding the identity's lock.
    ///
    /// Returns the aggregate as it stands after the command.
    #[tracing::instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn execute_by_id(
        &self,
        aggregate_id: &AggregateId,
        command: A::Command,
    ) -> Result<A, DomainError> {
        let lock = self.locks.lock_for(aggregate_id);
        let _guard = lock.lock().await;

        let mut aggregate = self.rebuild(aggregate_id).await?;
        Self::run(&mut aggregate, command)?;
        self.commit(&mut aggregate).await?;
        Ok(aggregate)
    }

    fn run(aggregate: &mut A, command: A::Command) -> Result<(), DomainError> {
        if let Err(e) = aggregate.handle(command) {
            metrics::counter!("commands_rejected_total").increment(1);
            tracing::warn!(error = %e, "command rejected");
            return Err(e.into());
        }

        metrics::counter!("commands_executed_total").increment(1);
        Ok(())
    }

    /// Returns how many buffered events are already in the store.
    ///
    /// Events stored after the aggregate's committed version count as landed
    /// only when they carry the ids of the leading buffered events, in order:
    /// a flush reported as failed may still have written them. Any other
    /// event means another writer moved the stream and the aggregate is stale.
    async fn check_stream(&self, aggregate: &A) -> Result<usize, DomainError> {
        let committed = aggregate.committed_version();
        let stored = self
            .store
            .stream_version(aggregate.id())
            .await?
            .unwrap_or_default();

        if stored == committed {
            return Ok(0);
        }

        let conflict = || {
            tracing::warn!(%stored, %committed, "aggregate out of step with its stream");
            DomainError::ConcurrencyConflict {
                aggregate_id: aggregate.id().clone(),
                expected: committed,
                actual: stored,
            }
        };

        if stored < committed {
            return Err(conflict());
        }

        let history = self.store.events_for(aggregate.id()).await?;
        let landed: Vec<EventId> = history
            .iter()
            .filter(|e| e.version > committed)
            .map(|e| e.event_id)
            .collect();
        let buffered = aggregate.buffer().ids();

        if landed.len() > buffered.len() || landed.as_slice() != &buffered[..landed.len()] {
            return Err(conflict());
        }

        Ok(landed.len())
    }

    async fn commit(&self, aggregate: &mut A) -> Result<(), DomainError> {
        if aggregate.uncommitted_events().is_empty() {
            return Ok(());
        }

        let landed = self.check_stream(aggregate).await?;
        let envelopes = build_envelopes(aggregate, landed)?;
        let count = envelopes.len();
        let expected = Version::new(aggregate.committed_version().as_i64() + landed as i64);

        match self
            .store
            .append_batch(envelopes, AppendOptions::expect_version(expected))
            .await
        {
            Ok(()) => {}
            Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual,
            }) => {
                tracing::warn!(
                    %expected,
                    %actual,
                    "stream moved during flush, keeping uncommitted events"
                );
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual,
                });
            }
            Err(e) => {
                let pending = aggregate.uncommitted_events().len();
                tracing::warn!(error = %e, pending, "flush failed, keeping uncommitted events");
                return Err(e.into());
            }
        }

        aggregate.mark_committed();
        tracing::debug!(count, version = %aggregate.version(), "events committed");
        Ok(())
    }
}

/// Builds event envelopes for an aggregate's uncommitted events, skipping
/// the first `skip` which are already stored.
///
/// Each envelope reuses the id its event was buffered under.
fn build_envelopes<A: Aggregate>(
    aggregate: &A,
    skip: usize,
) -> Result<Vec<EventEnvelope>, DomainError> {
    let mut version = Version::new(aggregate.committed_version().as_i64() + skip as i64);
    let pending = aggregate.uncommitted_events();
    let mut envelopes = Vec::with_capacity(pending.len().saturating_sub(skip));

    for (event, id) in pending.iter().zip(aggregate.buffer().ids()).skip(skip) {
        version = version.next();
        let envelope = EventEnvelope::builder()
            .event_id(*id)
            .aggregate_id(aggregate.id().clone())
            .aggregate_type(A::aggregate_type())
            .event_type(event.event_type())
            .version(version)
            .occurred_at(event.occurred_at())
            .payload(event)?
            .build()?;
        envelopes.push(envelope);
    }

    Ok(envelopes)
}
