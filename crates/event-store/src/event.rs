use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError, Result};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an event within its aggregate's stream.
///
/// Versions start at 1 for the first event and increment by 1 for each
/// subsequent event on an aggregate. Version 0 means "no events yet".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) for a new aggregate.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first version (1) for the first event.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// The stored form of a domain event.
///
/// Envelopes are what the store appends and returns. They are never mutated
/// after being built; the store only clones them out to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// The variant name of the event (e.g., "AccountOpened").
    pub event_type: String,

    /// The aggregate stream this event belongs to.
    pub aggregate_id: AggregateId,

    /// The type of aggregate (e.g., "Account").
    pub aggregate_type: String,

    /// Position of this event within the aggregate's stream.
    pub version: Version,

    /// When the state change happened.
    pub occurred_at: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Creates a new event envelope builder.
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }
}

impl std::fmt::Display for EventEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {} [{} v{}]: {}",
            self.event_type, self.occurred_at, self.aggregate_id, self.version, self.payload
        )
    }
}

/// Builder for constructing event envelopes.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    occurred_at: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
}

impl EventEnvelopeBuilder {
    /// Sets the event ID. If not set, a new ID will be generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: impl Into<AggregateId>) -> Self {
        self.aggregate_id = Some(id.into());
        self
    }

    /// Sets the aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the version.
    pub fn version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets when the event occurred. If not set, the current time is used.
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the event envelope.
    ///
    /// Fails with [`EventStoreError::IncompleteEnvelope`] naming the first
    /// required field (event_type, aggregate_id, aggregate_type, version,
    /// payload) that was not set.
    pub fn build(self) -> Result<EventEnvelope> {
        Ok(EventEnvelope {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self
                .event_type
                .ok_or(EventStoreError::IncompleteEnvelope("event_type"))?,
            aggregate_id: self
                .aggregate_id
                .ok_or(EventStoreError::IncompleteEnvelope("aggregate_id"))?,
            aggregate_type: self
                .aggregate_type
                .ok_or(EventStoreError::IncompleteEnvelope("aggregate_type"))?,
            version: self
                .version
                .ok_or(EventStoreError::IncompleteEnvelope("version"))?,
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
            payload: self
                .payload
                .ok_or(EventStoreError::IncompleteEnvelope("payload"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn event_id_new_creates_unique_ids() {
        let id1 = EventId::new();
        let id2 = EventId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn version_ordering() {
        let v1 = Version::new(1);
        let v2 = Version::new(2);
        assert!(v1 < v2);
        assert_eq!(v1.next(), v2);
    }

    #[test]
    fn version_initial_and_first() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::first().as_i64(), 1);
        assert_eq!(Version::initial().next(), Version::first());
    }

    #[test]
    fn event_envelope_builder() {
        let payload = serde_json::json!({"amount": 5000});

        let envelope = EventEnvelope::builder()
            .event_type("MoneyDeposited")
            .aggregate_id("ACCT-001")
            .aggregate_type("Account")
            .version(Version::first())
            .payload_raw(payload.clone())
            .build()
            .unwrap();

        assert_eq!(envelope.event_type, "MoneyDeposited");
        assert_eq!(envelope.aggregate_id, AggregateId::new("ACCT-001"));
        assert_eq!(envelope.aggregate_type, "Account");
        assert_eq!(envelope.version, Version::first());
        assert_eq!(envelope.payload, payload);
    }

    #[test]
    fn builder_keeps_explicit_event_id() {
        let id = EventId::new();
        let build = || {
            EventEnvelope::builder()
                .event_id(id)
                .event_type("AccountOpened")
                .aggregate_id("ACCT-001")
                .aggregate_type("Account")
                .version(Version::first())
                .payload_raw(serde_json::json!({}))
                .build()
                .unwrap()
        };

        assert_eq!(build().event_id, id);
        assert_eq!(build().event_id, build().event_id);
    }

    #[test]
    fn builder_generates_event_id_when_unset() {
        let build = || {
            EventEnvelope::builder()
                .event_type("AccountOpened")
                .aggregate_id("ACCT-001")
                .aggregate_type("Account")
                .version(Version::first())
                .payload_raw(serde_json::json!({}))
                .build()
                .unwrap()
        };

        assert_ne!(build().event_id, build().event_id);
    }

    #[test]
    fn builder_keeps_explicit_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let envelope = EventEnvelope::builder()
            .event_type("AccountOpened")
            .aggregate_id("ACCT-001")
            .aggregate_type("Account")
            .version(Version::first())
            .occurred_at(at)
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap();

        assert_eq!(envelope.occurred_at, at);
    }

    #[test]
    fn build_reports_missing_field() {
        let result = EventEnvelope::builder()
            .event_type("AccountOpened")
            .aggregate_type("Account")
            .version(Version::first())
            .payload_raw(serde_json::json!({}))
            .build();

        assert!(matches!(
            result,
            Err(EventStoreError::IncompleteEnvelope("aggregate_id"))
        ));
    }

    #[test]
    fn display_includes_type_stream_and_payload() {
        let envelope = EventEnvelope::builder()
            .event_type("MoneyWithdrawn")
            .aggregate_id("ACCT-001")
            .aggregate_type("Account")
            .version(Version::new(3))
            .payload_raw(serde_json::json!({"amount": 100}))
            .build()
            .unwrap();

        let rendered = envelope.to_string();
        assert!(rendered.starts_with("MoneyWithdrawn at "));
        assert!(rendered.contains("[ACCT-001 v3]"));
        assert!(rendered.ends_with("{\"amount\":100}"));
    }
}
