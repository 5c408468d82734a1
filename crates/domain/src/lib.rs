//! Domain layer for the event-sourced ledger.
//!
//! This crate provides the core domain abstractions including:
//! - Aggregate trait for event-sourced entities, with its uncommitted buffer
//! - DomainEvent trait for domain events
//! - CommandHandler, which commits buffered events and rebuilds aggregates
//! - Account aggregate implementation

pub mod account;
pub mod aggregate;
pub mod command;
pub mod error;

pub use account::{
    Account, AccountCommand, AccountError, AccountEvent, AccountService, AccountState, Money,
    MoneyParseError,
};
pub use aggregate::{Aggregate, DomainEvent, EventBuffer};
pub use command::CommandHandler;
pub use error::{DomainError, IntegrityError};
