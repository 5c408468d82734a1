//! Account aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Account;
pub use commands::AccountCommand;
pub use events::{AccountEvent, AccountOpenedData, MoneyDepositedData, MoneyWithdrawnData};
pub use service::AccountService;
pub use state::AccountState;
pub use value_objects::{Money, MoneyParseError};

use thiserror::Error;

/// Reasons an account command is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    /// The account was already opened.
    #[error("Account already open")]
    AlreadyOpen,

    /// The account has not been opened yet.
    #[error("Account is not open (state: {state})")]
    NotOpen { state: AccountState },

    /// Deposits and withdrawals must move a positive amount.
    #[error("Invalid amount: {amount} (must be greater than 0)")]
    NonPositiveAmount { amount: Money },

    /// An account cannot start in debt.
    #[error("Invalid initial balance: {balance} (must not be negative)")]
    NegativeInitialBalance { balance: Money },

    /// A withdrawal asked for more than the balance.
    #[error("Insufficient balance: requested {requested}, available {balance}")]
    InsufficientBalance { balance: Money, requested: Money },

    /// A deposit would overflow the balance.
    #[error("Balance overflow: {balance} + {amount}")]
    BalanceOverflow { balance: Money, amount: Money },
}
