//! Account domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::Money;

/// Events that can occur on an account aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AccountEvent {
    /// Account was opened with an initial balance.
    AccountOpened(AccountOpenedData),

    /// Money was deposited.
    MoneyDeposited(MoneyDepositedData),

    /// Money was withdrawn.
    MoneyWithdrawn(MoneyWithdrawnData),
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::AccountOpened(_) => "AccountOpened",
            AccountEvent::MoneyDeposited(_) => "MoneyDeposited",
            AccountEvent::MoneyWithdrawn(_) => "MoneyWithdrawn",
        }
    }

    fn event_types() -> &'static [&'static str] {
        &["AccountOpened", "MoneyDeposited", "MoneyWithdrawn"]
    }

    fn aggregate_id(&self) -> &AggregateId {
        match self {
            AccountEvent::AccountOpened(data) => &data.account_id,
            AccountEvent::MoneyDeposited(data) => &data.account_id,
            AccountEvent::MoneyWithdrawn(data) => &data.account_id,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AccountEvent::AccountOpened(data) => data.occurred_at,
            AccountEvent::MoneyDeposited(data) => data.occurred_at,
            AccountEvent::MoneyWithdrawn(data) => data.occurred_at,
        }
    }
}

impl std::fmt::Display for AccountEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}: ", self.event_type(), self.occurred_at())?;
        match self {
            AccountEvent::AccountOpened(data) => write!(
                f,
                "Account {} opened with balance {}",
                data.account_id, data.initial_balance
            ),
            AccountEvent::MoneyDeposited(data) => write!(
                f,
                "{} deposited to account {}",
                data.amount, data.account_id
            ),
            AccountEvent::MoneyWithdrawn(data) => write!(
                f,
                "{} withdrawn from account {}",
                data.amount, data.account_id
            ),
        }
    }
}

/// Data for AccountOpened event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountOpenedData {
    /// The account that was opened.
    pub account_id: AggregateId,

    /// Balance the account starts with.
    pub initial_balance: Money,

    /// When the account was opened.
    pub occurred_at: DateTime<Utc>,
}

/// Data for MoneyDeposited event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyDepositedData {
    /// The account credited.
    pub account_id: AggregateId,

    /// Amount deposited.
    pub amount: Money,

    /// When the deposit happened.
    pub occurred_at: DateTime<Utc>,
}

/// Data for MoneyWithdrawn event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyWithdrawnData {
    /// The account debited.
    pub account_id: AggregateId,

    /// Amount withdrawn.
    pub amount: Money,

    /// When the withdrawal happened.
    pub occurred_at: DateTime<Utc>,
}

// Convenience constructors for events
impl AccountEvent {
    /// Creates an AccountOpened event stamped with the current time.
    pub fn account_opened(account_id: AggregateId, initial_balance: Money) -> Self {
        Self::account_opened_at(account_id, initial_balance, Utc::now())
    }

    /// Creates an AccountOpened event at an explicit time.
    pub fn account_opened_at(
        account_id: AggregateId,
        initial_balance: Money,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        AccountEvent::AccountOpened(AccountOpenedData {
            account_id,
            initial_balance,
            occurred_at,
        })
    }

    /// Creates a MoneyDeposited event stamped with the current time.
    pub fn money_deposited(account_id: AggregateId, amount: Money) -> Self {
        Self::money_deposited_at(account_id, amount, Utc::now())
    }

    /// Creates a MoneyDeposited event at an explicit time.
    pub fn money_deposited_at(
        account_id: AggregateId,
        amount: Money,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        AccountEvent::MoneyDeposited(MoneyDepositedData {
            account_id,
            amount,
            occurred_at,
        })
    }

    /// Creates a MoneyWithdrawn event stamped with the current time.
    pub fn money_withdrawn(account_id: AggregateId, amount: Money) -> Self {
        Self::money_withdrawn_at(account_id, amount, Utc::now())
    }

    /// Creates a MoneyWithdrawn event at an explicit time.
    pub fn money_withdrawn_at(
        account_id: AggregateId,
        amount: Money,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        AccountEvent::MoneyWithdrawn(MoneyWithdrawnData {
            account_id,
            amount,
            occurred_at,
        })
    }
}
