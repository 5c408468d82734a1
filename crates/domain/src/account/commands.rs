//! Account commands.

use super::Money;

/// A request to change an account.
///
/// Commands may be rejected if the account's current state doesn't allow the
/// action; a rejected command records no event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountCommand {
    /// Open the account with a starting balance.
    Open { initial_balance: Money },

    /// Credit the account.
    Deposit { amount: Money },

    /// Debit the account.
    Withdraw { amount: Money },
}

impl AccountCommand {
    /// Creates an Open command.
    pub fn open(initial_balance: Money) -> Self {
        AccountCommand::Open { initial_balance }
    }

    /// Creates a Deposit command.
    pub fn deposit(amount: Money) -> Self {
        AccountCommand::Deposit { amount }
    }

    /// Creates a Withdraw command.
    pub fn withdraw(amount: Money) -> Self {
        AccountCommand::Withdraw { amount }
    }

    /// Returns the command name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            AccountCommand::Open { .. } => "open",
            AccountCommand::Deposit { .. } => "deposit",
            AccountCommand::Withdraw { .. } => "withdraw",
        }
    }
}
