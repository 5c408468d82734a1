//! Account aggregate implementation.

use common::AggregateId;
use event_store::Version;

use crate::aggregate::{Aggregate, EventBuffer};

use super::{AccountCommand, AccountError, AccountEvent, AccountState, Money};

/// Account aggregate root.
///
/// The balance is never assigned directly: every change is an
/// [`AccountEvent`] passed through [`Aggregate::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// Account identifier.
    id: AggregateId,

    /// Number of events applied, committed or not.
    version: Version,

    /// Current lifecycle state.
    state: AccountState,

    /// Current balance.
    balance: Money,

    /// Events recorded since the last commit.
    pending: EventBuffer<AccountEvent>,
}

impl Aggregate for Account {
    type Event = AccountEvent;
    type Command = AccountCommand;
    type Error = AccountError;

    fn aggregate_type() -> &'static str {
        "Account"
    }

    fn new(id: AggregateId) -> Self {
        Self {
            id,
            version: Version::initial(),
            state: AccountState::Uninitialized,
            balance: Money::zero(),
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
            AccountEvent::AccountOpened(data) => {
                self.state = AccountState::Active;
                self.balance = data.initial_balance;
            }
            AccountEvent::MoneyDeposited(data) => {
                self.balance += data.amount;
            }
            AccountEvent::MoneyWithdrawn(data) => {
                self.balance -= data.amount;
            }
        }
    }

    fn handle(&mut self, command: AccountCommand) -> Result<(), AccountError> {
        match command {
            AccountCommand::Open { initial_balance } => self.open(initial_balance),
            AccountCommand::Deposit { amount } => self.deposit(amount),
            AccountCommand::Withdraw { amount } => self.withdraw(amount),
        }
    }

    fn validate_replay(&self, event: &AccountEvent) -> Result<(), AccountError> {
        match event {
            AccountEvent::AccountOpened(data) => self.check_open(data.initial_balance),
            AccountEvent::MoneyDeposited(data) => self.check_deposit(data.amount),
            AccountEvent::MoneyWithdrawn(data) => self.check_withdraw(data.amount),
        }
    }

    fn buffer(&self) -> &EventBuffer<AccountEvent> {
        &self.pending
    }

    fn buffer_mut(&mut self) -> &mut EventBuffer<AccountEvent> {
        &mut self.pending
    }
}

// Query methods
impl Account {
    /// Returns the current state.
    pub fn state(&self) -> AccountState {
        self.state
    }

    /// Returns the current balance.
    pub fn balance(&self) -> Money {
        self.balance
    }

    /// Returns true once the account has been opened.
    pub fn is_open(&self) -> bool {
        self.state.can_transact()
    }
}

// Command methods (validate, then record)
impl Account {
    /// Opens the account with a starting balance.
    pub fn open(&mut self, initial_balance: Money) -> Result<(), AccountError> {
        self.check_open(initial_balance)?;
        self.record(AccountEvent::account_opened(
            self.id.clone(),
            initial_balance,
        ));
        Ok(())
    }

    /// Credits the account.
    pub fn deposit(&mut self, amount: Money) -> Result<(), AccountError> {
        self.check_deposit(amount)?;
        self.record(AccountEvent::money_deposited(self.id.clone(), amount));
        Ok(())
    }

    /// Debits the account.
    pub fn withdraw(&mut self, amount: Money) -> Result<(), AccountError> {
        self.check_withdraw(amount)?;
        self.record(AccountEvent::money_withdrawn(self.id.clone(), amount));
        Ok(())
    }
}

// Invariant checks shared by commands and replay
impl Account {
    fn check_open(&self, initial_balance: Money) -> Result<(), AccountError> {
        if !self.state.can_open() {
            return Err(AccountError::AlreadyOpen);
        }

        if initial_balance.is_negative() {
            return Err(AccountError::NegativeInitialBalance {
                balance: initial_balance,
            });
        }

        Ok(())
    }

    fn check_deposit(&self, amount: Money) -> Result<(), AccountError> {
        self.ensure_open()?;
        Self::ensure_positive(amount)?;

        if self.balance.checked_add(amount).is_none() {
            return Err(AccountError::BalanceOverflow {
                balance: self.balance,
                amount,
            });
        }

        Ok(())
    }

    fn check_withdraw(&self, amount: Money) -> Result<(), AccountError> {
        self.ensure_open()?;
        Self::ensure_positive(amount)?;

        if amount > self.balance {
            return Err(AccountError::InsufficientBalance {
                balance: self.balance,
                requested: amount,
            });
        }

        Ok(())
    }

    fn ensure_open(&self) -> Result<(), AccountError> {
        if self.state.can_transact() {
            Ok(())
        } else {
            Err(AccountError::NotOpen { state: self.state })
        }
    }

    fn ensure_positive(amount: Money) -> Result<(), AccountError> {
        if amount.is_positive() {
            Ok(())
        } else {
            Err(AccountError::NonPositiveAmount { amount })
        }
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Account({}): balance={}", self.id, self.balance)
    }
}
