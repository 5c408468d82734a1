//! Command-line driver for the event-sourced ledger.
//!
//! Runs a short script of account commands against an in-memory store,
//! commits the result and prints the audit trail next to the account
//! rebuilt from it.

pub mod config;
pub mod error;
pub mod script;

pub use config::{Config, LogFormat};
pub use error::LedgerError;
pub use script::{Outcome, Rejection, audit_trail, default_script, parse_script, run_script};
