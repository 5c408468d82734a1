//! Ledger error types.

use domain::{DomainError, MoneyParseError};
use event_store::EventStoreError;
use thiserror::Error;

/// Errors surfaced by the ledger binary.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A script word is not a known command.
    #[error("Unknown command {0:?} (expected open, deposit or withdraw)")]
    UnknownCommand(String),

    /// A command word was the last argument.
    #[error("Missing amount after {0}")]
    MissingAmount(String),

    /// A command's amount does not parse.
    #[error("Bad amount for {command}: {source}")]
    InvalidAmount {
        command: String,
        source: MoneyParseError,
    },

    /// The core failed for a reason other than a rejected command.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Reading the event log failed.
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    /// A stored payload could not be rendered.
    #[error("Undecodable event payload: {0}")]
    Payload(#[from] serde_json::Error),
}
