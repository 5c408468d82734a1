//! Account lifecycle state.

use serde::{Deserialize, Serialize};

/// The state of an account in its lifecycle.
///
/// ```text
/// Uninitialized ──AccountOpened──► Active
/// ```
///
/// There is no terminal state: an active account stays active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AccountState {
    /// No opening event has been applied yet.
    #[default]
    Uninitialized,

    /// Opened; deposits and withdrawals are accepted.
    Active,
}

impl AccountState {
    /// Returns true if the account can be opened in this state.
    pub fn can_open(&self) -> bool {
        matches!(self, AccountState::Uninitialized)
    }

    /// Returns true if money can move in this state.
    pub fn can_transact(&self) -> bool {
        matches!(self, AccountState::Active)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountState::Uninitialized => "Uninitialized",
            AccountState::Active => "Active",
        }
    }
}

impl std::fmt::Display for AccountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
