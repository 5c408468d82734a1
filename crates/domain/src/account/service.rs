//! Account service providing a simplified API for account operations.

use common::AggregateId;
use event_store::{EventEnvelope, EventStore};

use crate::command::CommandHandler;
use crate::error::DomainError;

use super::{Account, AccountCommand, Money};

/// Service for managing accounts.
///
/// Every operation rebuilds the account from the store, runs one command
/// and commits, under the account's lock. Nothing is cached between calls.
pub struct AccountService<S: EventStore> {
    handler: CommandHandler<S, Account>,
}

impl<S: EventStore> AccountService<S> {
    /// Creates a new account service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Account> {
        &self.handler
    }

    /// Opens a new account.
    #[tracing::instrument(skip(self))]
    pub async fn open_account(
        &self,
        account_id: &AggregateId,
        initial_balance: Money,
    ) -> Result<Account, DomainError> {
        self.handler
            .execute_by_id(account_id, AccountCommand::open(initial_balance))
            .await
    }

    /// Deposits money into an account.
    #[tracing::instrument(skip(self))]
    pub async fn deposit(
        &self,
        account_id: &AggregateId,
        amount: Money,
    ) -> Result<Account, DomainError> {
        self.handler
            .execute_by_id(account_id, AccountCommand::deposit(amount))
            .await
    }

    /// Withdraws money from an account.
    #[tracing::instrument(skip(self))]
    pub async fn withdraw(
        &self,
        account_id: &AggregateId,
        amount: Money,
    ) -> Result<Account, DomainError> {
        self.handler
            .execute_by_id(account_id, AccountCommand::withdraw(amount))
            .await
    }

    /// Loads an account by ID.
    ///
    /// Returns None if the account was never opened.
    #[tracing::instrument(skip(self))]
    pub async fn get_account(
        &self,
        account_id: &AggregateId,
    ) -> Result<Option<Account>, DomainError> {
        let account = self.handler.rebuild(account_id).await?;
        Ok(account.is_open().then_some(account))
    }

    /// Returns the stored history of an account, oldest first.
    pub async fn history(
        &self,
        account_id: &AggregateId,
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        Ok(self.handler.store().events_for(account_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountError, AccountState};
    use crate::aggregate::Aggregate;
    use event_store::{InMemoryEventStore, Version};

    fn acct() -> AggregateId {
        AggregateId::new("ACCT-001")
    }

    #[tokio::test]
    async fn test_open_account() {
        let service = AccountService::new(InMemoryEventStore::new());

        let account = service
            .open_account(&acct(), Money::from_cents(10000))
            .await
            .unwrap();

        assert_eq!(account.id(), &acct());
        assert_eq!(account.state(), AccountState::Active);
        assert_eq!(account.balance().cents(), 10000);
    }

    #[tokio::test]
    async fn test_open_twice_fails() {
        let service = AccountService::new(InMemoryEventStore::new());
        service
            .open_account(&acct(), Money::from_cents(10000))
            .await
            .unwrap();

        let result = service.open_account(&acct(), Money::from_cents(1)).await;
        assert!(matches!(
            result,
            Err(DomainError::Validation(AccountError::AlreadyOpen))
        ));
    }

    #[tokio::test]
    async fn test_deposit_and_withdraw() {
        let service = AccountService::new(InMemoryEventStore::new());
        service
            .open_account(&acct(), Money::from_cents(10000))
            .await
            .unwrap();

        service
            .deposit(&acct(), Money::from_cents(5000))
            .await
            .unwrap();
        let account = service
            .withdraw(&acct(), Money::from_cents(3000))
            .await
            .unwrap();

        assert_eq!(account.balance().cents(), 12000);
        assert_eq!(account.version(), Version::new(3));
    }

    #[tokio::test]
    async fn test_get_account() {
        let service = AccountService::new(InMemoryEventStore::new());

        // Non-existent account
        let result = service.get_account(&acct()).await.unwrap();
        assert!(result.is_none());

        service
            .open_account(&acct(), Money::from_cents(10000))
            .await
            .unwrap();

        let result = service.get_account(&acct()).await.unwrap();
        assert_eq!(result.unwrap().balance().cents(), 10000);
    }

    #[tokio::test]
    async fn test_history() {
        let service = AccountService::new(InMemoryEventStore::new());
        service
            .open_account(&acct(), Money::from_cents(10000))
            .await
            .unwrap();
        service
            .deposit(&acct(), Money::from_cents(5000))
            .await
            .unwrap();

        let history = service.history(&acct()).await.unwrap();
        let types: Vec<_> = history.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, ["AccountOpened", "MoneyDeposited"]);

        assert!(service.history(&AggregateId::new("NOPE")).await.unwrap().is_empty());
    }
}
