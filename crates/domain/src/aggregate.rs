//! Core aggregate and domain event traits.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, EventId, Version};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::IntegrityError;

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent:
    Serialize + DeserializeOwned + Send + Sync + Clone + std::fmt::Debug + std::fmt::Display
{
    /// Returns the event type name.
    ///
    /// This is used for serialization and event store filtering.
    fn event_type(&self) -> &'static str;

    /// Every event type name this event enum can decode.
    fn event_types() -> &'static [&'static str];

    /// The aggregate stream this event belongs to.
    fn aggregate_id(&self) -> &AggregateId;

    /// When the state change happened.
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Events produced by commands and not yet written to the store.
///
/// Each event gets its [`EventId`] when it is buffered and keeps it until it
/// is committed, so every flush attempt writes the same ids.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBuffer<E> {
    pending: Vec<E>,
    ids: Vec<EventId>,
}

impl<E> EventBuffer<E> {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            ids: Vec::new(),
        }
    }

    /// Appends an event to the buffer under a fresh id.
    pub fn push(&mut self, event: E) {
        self.ids.push(EventId::new());
        self.pending.push(event);
    }

    /// Returns the buffered events, oldest first.
    pub fn as_slice(&self) -> &[E] {
        &self.pending
    }

    /// Returns the ids of the buffered events, in the same order.
    pub fn ids(&self) -> &[EventId] {
        &self.ids
    }

    /// Returns the number of buffered events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every buffered event.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.ids.clear();
    }
}

impl<E> Default for EventBuffer<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for aggregates in an event-sourced system.
///
/// In event sourcing, aggregates:
/// - Are rebuilt by replaying events
/// - Turn commands into events, recording them in an uncommitted buffer
/// - Apply events to update state (pure, deterministic)
///
/// State only ever changes through [`Aggregate::apply`]; commands go through
/// [`Aggregate::record`], and rebuilds go through
/// [`Aggregate::load_from_history`].
pub trait Aggregate: Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The commands this aggregate accepts.
    type Command: Send + std::fmt::Debug;

    /// The type of errors this aggregate's commands can produce.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the aggregate type name.
    ///
    /// Stored alongside every event so that streams of different aggregate
    /// kinds cannot be replayed into each other.
    fn aggregate_type() -> &'static str;

    /// Creates an aggregate in its zero state, before any event.
    fn new(id: AggregateId) -> Self;

    /// Returns the aggregate's identity.
    fn id(&self) -> &AggregateId;

    /// Returns the number of events applied so far, committed or not.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be pure and deterministic:
    /// - Given the same state and event, it must always produce the same new state
    /// - It must not have side effects
    /// - It must not fail (events represent facts that have happened)
    fn apply(&mut self, event: &Self::Event);

    /// Validates a command and records the resulting event, if any.
    ///
    /// A rejected command must leave the aggregate untouched.
    fn handle(&mut self, command: Self::Command) -> Result<(), Self::Error>;

    /// Checks that a stored event could have been produced from the current
    /// state.
    ///
    /// Replay calls this before every [`Aggregate::apply`], so a stream that
    /// breaks the aggregate's invariants is reported instead of applied. The
    /// default accepts every event.
    fn validate_replay(&self, _event: &Self::Event) -> Result<(), Self::Error> {
        Ok(())
    }

    /// The buffer of uncommitted events.
    fn buffer(&self) -> &EventBuffer<Self::Event>;

    /// Mutable access to the buffer of uncommitted events.
    fn buffer_mut(&mut self) -> &mut EventBuffer<Self::Event>;

    /// Applies a newly produced event and buffers it for commit.
    fn record(&mut self, event: Self::Event) {
        self.apply(&event);
        self.set_version(self.version().next());
        self.buffer_mut().push(event);
    }

    /// Events recorded since the last commit, oldest first.
    fn uncommitted_events(&self) -> &[Self::Event] {
        self.buffer().as_slice()
    }

    /// Clears the uncommitted buffer once its events are in the store.
    fn mark_committed(&mut self) {
        self.buffer_mut().clear();
    }

    /// The version of the last event known to be in the store.
    fn committed_version(&self) -> Version {
        Version::new(self.version().as_i64() - self.buffer().len() as i64)
    }

    /// Applies multiple already-committed events in sequence.
    fn apply_events<'a>(&mut self, events: impl IntoIterator<Item = &'a Self::Event>)
    where
        Self::Event: 'a,
    {
        for event in events {
            self.apply(event);
            self.set_version(self.version().next());
        }
    }

    /// Resets to the zero state and replays a stored history in order.
    ///
    /// The history is replayed into a fresh instance which only replaces
    /// `self` once every event has been applied, so a corrupt stream never
    /// leaves a partially replayed aggregate behind.
    fn load_from_history(&mut self, history: &[EventEnvelope]) -> Result<(), IntegrityError> {
        let mut rebuilt = Self::new(self.id().clone());
        for envelope in history {
            let event = decode_event::<Self>(rebuilt.id(), rebuilt.version(), envelope)?;
            rebuilt
                .validate_replay(&event)
                .map_err(|e| IntegrityError::InvalidEvent {
                    aggregate_id: rebuilt.id().clone(),
                    event_type: envelope.event_type.clone(),
                    version: envelope.version,
                    reason: e.to_string(),
                })?;
            rebuilt.apply(&event);
            rebuilt.set_version(envelope.version);
        }
        *self = rebuilt;
        Ok(())
    }
}

/// Decodes the next stored event of an aggregate's stream.
///
/// `current` is the version the aggregate has reached so far; the envelope
/// must carry the version right after it.
pub fn decode_event<A: Aggregate>(
    aggregate_id: &AggregateId,
    current: Version,
    envelope: &EventEnvelope,
) -> Result<A::Event, IntegrityError> {
    if &envelope.aggregate_id != aggregate_id {
        return Err(IntegrityError::ForeignEvent {
            event_id: envelope.event_id,
            expected: aggregate_id.clone(),
            found: envelope.aggregate_id.clone(),
        });
    }

    if envelope.aggregate_type != A::aggregate_type() {
        return Err(IntegrityError::AggregateTypeMismatch {
            event_id: envelope.event_id,
            expected: A::aggregate_type(),
            found: envelope.aggregate_type.clone(),
        });
    }

    if envelope.version != current.next() {
        return Err(IntegrityError::OutOfSequence {
            aggregate_id: aggregate_id.clone(),
            expected: current.next(),
            found: envelope.version,
        });
    }

    if !A::Event::event_types().contains(&envelope.event_type.as_str()) {
        return Err(IntegrityError::UnrecognizedEvent {
            aggregate_id: aggregate_id.clone(),
            event_type: envelope.event_type.clone(),
            version: envelope.version,
        });
    }

    let event: A::Event = serde_json::from_value(envelope.payload.clone()).map_err(|source| {
        IntegrityError::MalformedPayload {
            aggregate_id: aggregate_id.clone(),
            event_type: envelope.event_type.clone(),
            version: envelope.version,
            source,
        }
    })?;

    // The payload carries its own copy of the identity.
    if event.aggregate_id() != aggregate_id {
        return Err(IntegrityError::ForeignEvent {
            event_id: envelope.event_id,
            expected: aggregate_id.clone(),
            found: event.aggregate_id().clone(),
        });
    }

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", content = "data")]
    enum TestEvent {
        Started {
            id: AggregateId,
            at: DateTime<Utc>,
        },
        Incremented {
            id: AggregateId,
            by: i32,
            at: DateTime<Utc>,
        },
    }

    impl std::fmt::Display for TestEvent {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{} at {}", self.event_type(), self.occurred_at())
        }
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Started { .. } => "Started",
                TestEvent::Incremented { .. } => "Incremented",
            }
        }

        fn event_types() -> &'static [&'static str] {
            &["Started", "Incremented"]
        }

        fn aggregate_id(&self) -> &AggregateId {
            match self {
                TestEvent::Started { id, .. } | TestEvent::Incremented { id, .. } => id,
            }
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            match self {
                TestEvent::Started { at, .. } | TestEvent::Incremented { at, .. } => *at,
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("counter not started")]
    struct NotStarted;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        id: AggregateId,
        version: Version,
        started: bool,
        value: i32,
        pending: EventBuffer<TestEvent>,
    }

    impl Aggregate for Counter {
        type Event = TestEvent;
        type Command = i32;
        type Error = NotStarted;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn new(id: AggregateId) -> Self {
            Self {
                id,
                version: Version::initial(),
                started: false,
                value: 0,
                pending: EventBuffer::new(),
            }
        }

        fn id(&self) -> &AggregateId {
            &self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: &Self::Event) {
            match event {
                TestEvent::Started { .. } => self.started = true,
                TestEvent::Incremented { by, .. } => self.value += by,
            }
        }

        fn handle(&mut self, by: i32) -> Result<(), NotStarted> {
            if !self.started {
                return Err(NotStarted);
            }
            self.record(TestEvent::Incremented {
                id: self.id.clone(),
                by,
                at: Utc::now(),
            });
            Ok(())
        }

        fn validate_replay(&self, event: &TestEvent) -> Result<(), NotStarted> {
            match event {
                TestEvent::Incremented { .. } if !self.started => Err(NotStarted),
                _ => Ok(()),
            }
        }

        fn buffer(&self) -> &EventBuffer<TestEvent> {
            &self.pending
        }

        fn buffer_mut(&mut self) -> &mut EventBuffer<TestEvent> {
            &mut self.pending
        }
    }

    fn started_counter() -> Counter {
        let mut counter = Counter::new(AggregateId::new("C-1"));
        counter.record(TestEvent::Started {
            id: counter.id.clone(),
            at: Utc::now(),
        });
        counter
    }

    fn envelope(id: &str, aggregate_type: &str, version: i64, event: &TestEvent) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(id)
            .aggregate_type(aggregate_type)
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
            .unwrap()
    }

    fn history_of(counter: &Counter) -> Vec<EventEnvelope> {
        counter
            .uncommitted_events()
            .iter()
            .enumerate()
            .map(|(i, e)| envelope("C-1", "Counter", i as i64 + 1, e))
            .collect()
    }

    #[test]
    fn record_applies_and_buffers() {
        let mut counter = started_counter();
        counter.handle(5).unwrap();

        assert_eq!(counter.value, 5);
        assert_eq!(counter.version(), Version::new(2));
        assert_eq!(counter.uncommitted_events().len(), 2);
        assert_eq!(counter.committed_version(), Version::initial());
    }

    #[test]
    fn rejected_command_changes_nothing() {
        let mut counter = Counter::new(AggregateId::new("C-1"));
        let before = counter.clone();

        assert!(counter.handle(5).is_err());
        assert_eq!(counter, before);
    }

    #[test]
    fn mark_committed_clears_buffer_and_keeps_version() {
        let mut counter = started_counter();
        counter.handle(1).unwrap();
        counter.mark_committed();

        assert!(counter.uncommitted_events().is_empty());
        assert_eq!(counter.version(), Version::new(2));
        assert_eq!(counter.committed_version(), Version::new(2));
    }

    #[test]
    fn apply_events_advances_version() {
        let mut counter = Counter::new(AggregateId::new("C-1"));
        let id = counter.id.clone();
        let events = vec![
            TestEvent::Started {
                id: id.clone(),
                at: Utc::now(),
            },
            TestEvent::Incremented {
                id,
                by: 42,
                at: Utc::now(),
            },
        ];

        counter.apply_events(&events);

        assert!(counter.started);
        assert_eq!(counter.value, 42);
        assert_eq!(counter.version(), Version::new(2));
        assert!(counter.uncommitted_events().is_empty());
    }

    #[test]
    fn load_from_history_matches_live_state() {
        let mut live = started_counter();
        live.handle(3).unwrap();
        live.handle(-1).unwrap();
        let history = history_of(&live);
        live.mark_committed();

        let mut rebuilt = Counter::new(AggregateId::new("C-1"));
        rebuilt.load_from_history(&history).unwrap();

        assert_eq!(rebuilt, live);
    }

    #[test]
    fn load_from_history_resets_previous_state() {
        let mut live = started_counter();
        live.handle(3).unwrap();
        let history = history_of(&live);

        let mut counter = started_counter();
        counter.handle(100).unwrap();
        counter.load_from_history(&history).unwrap();

        assert_eq!(counter.value, 3);
        assert!(counter.uncommitted_events().is_empty());
    }

    #[test]
    fn buffered_events_keep_their_ids() {
        let mut counter = started_counter();
        counter.handle(1).unwrap();
        let ids = counter.buffer().ids().to_vec();

        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);

        counter.handle(2).unwrap();
        assert_eq!(&counter.buffer().ids()[..2], ids.as_slice());

        counter.mark_committed();
        assert!(counter.buffer().ids().is_empty());
    }

    #[test]
    fn event_breaking_invariants_aborts_replay() {
        let id = AggregateId::new("C-1");
        let history = vec![envelope(
            "C-1",
            "Counter",
            1,
            &TestEvent::Incremented {
                id: id.clone(),
                by: 1,
                at: Utc::now(),
            },
        )];

        let mut counter = Counter::new(id);
        let result = counter.load_from_history(&history);

        assert!(matches!(
            result,
            Err(IntegrityError::InvalidEvent { ref event_type, version, .. })
                if event_type == "Incremented" && version == Version::first()
        ));
        assert_eq!(counter.value, 0);
        assert_eq!(counter.version(), Version::initial());
    }

    #[test]
    fn unrecognized_event_aborts_replay() {
        let mut live = started_counter();
        live.handle(3).unwrap();
        let mut history = history_of(&live);
        history.push(
            EventEnvelope::builder()
                .aggregate_id("C-1")
                .aggregate_type("Counter")
                .event_type("Reset")
                .version(Version::new(3))
                .payload_raw(serde_json::json!({"type": "Reset", "data": {}}))
                .build()
                .unwrap(),
        );

        let mut counter = Counter::new(AggregateId::new("C-1"));
        let result = counter.load_from_history(&history);

        assert!(matches!(
            result,
            Err(IntegrityError::UnrecognizedEvent { ref event_type, .. }) if event_type == "Reset"
        ));
        // Nothing from the valid prefix leaked into the aggregate.
        assert_eq!(counter, Counter::new(AggregateId::new("C-1")));
    }

    #[test]
    fn malformed_payload_aborts_replay() {
        let history = vec![
            EventEnvelope::builder()
                .aggregate_id("C-1")
                .aggregate_type("Counter")
                .event_type("Started")
                .version(Version::first())
                .payload_raw(serde_json::json!({"type": "Started", "data": {"id": 7}}))
                .build()
                .unwrap(),
        ];

        let mut counter = Counter::new(AggregateId::new("C-1"));
        let result = counter.load_from_history(&history);
        assert!(matches!(result, Err(IntegrityError::MalformedPayload { .. })));
    }

    #[test]
    fn foreign_event_aborts_replay() {
        let other = TestEvent::Started {
            id: AggregateId::new("C-2"),
            at: Utc::now(),
        };
        let history = vec![envelope("C-2", "Counter", 1, &other)];

        let mut counter = Counter::new(AggregateId::new("C-1"));
        let result = counter.load_from_history(&history);
        assert!(matches!(result, Err(IntegrityError::ForeignEvent { .. })));
    }

    #[test]
    fn payload_identity_must_match_envelope() {
        let other = TestEvent::Started {
            id: AggregateId::new("C-2"),
            at: Utc::now(),
        };
        let history = vec![envelope("C-1", "Counter", 1, &other)];

        let mut counter = Counter::new(AggregateId::new("C-1"));
        let result = counter.load_from_history(&history);
        assert!(matches!(result, Err(IntegrityError::ForeignEvent { .. })));
    }

    #[test]
    fn wrong_aggregate_type_aborts_replay() {
        let event = TestEvent::Started {
            id: AggregateId::new("C-1"),
            at: Utc::now(),
        };
        let history = vec![envelope("C-1", "Account", 1, &event)];

        let mut counter = Counter::new(AggregateId::new("C-1"));
        let result = counter.load_from_history(&history);
        assert!(matches!(
            result,
            Err(IntegrityError::AggregateTypeMismatch { .. })
        ));
    }

    #[test]
    fn version_gap_aborts_replay() {
        let live = started_counter();
        let mut history = history_of(&live);
        history[0].version = Version::new(2);

        let mut counter = Counter::new(AggregateId::new("C-1"));
        let result = counter.load_from_history(&history);
        assert!(matches!(
            result,
            Err(IntegrityError::OutOfSequence { expected, found, .. })
                if expected == Version::first() && found == Version::new(2)
        ));
    }
}
