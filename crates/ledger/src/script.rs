//! Command scripts and the run that drives them.

use common::AggregateId;
use domain::{Account, AccountCommand, AccountError, AccountEvent, Aggregate, CommandHandler, Money};
use event_store::EventStore;
use futures_util::TryStreamExt;

use crate::error::LedgerError;

/// A command the account refused, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub command: AccountCommand,
    pub error: AccountError,
}

/// Result of running a script.
#[derive(Debug)]
pub struct Outcome {
    /// The account the commands ran against, after commit.
    pub account: Account,

    /// Commands that were refused, in script order.
    pub rejections: Vec<Rejection>,

    /// The account rebuilt from the store after commit.
    pub rebuilt: Account,
}

/// Open with 100.00, deposit 50.00, then try to withdraw 1000.00.
pub fn default_script() -> Vec<AccountCommand> {
    vec![
        AccountCommand::open(Money::from_cents(10000)),
        AccountCommand::deposit(Money::from_cents(5000)),
        AccountCommand::withdraw(Money::from_cents(100000)),
    ]
}

/// Parses `verb amount` pairs such as `open 100.00 deposit 50 withdraw 1000`.
pub fn parse_script<I, T>(args: I) -> Result<Vec<AccountCommand>, LedgerError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut words = args.into_iter();
    let mut script = Vec::new();

    while let Some(word) = words.next() {
        let verb = word.as_ref().to_ascii_lowercase();
        let build: fn(Money) -> AccountCommand = match verb.as_str() {
            "open" => AccountCommand::open,
            "deposit" => AccountCommand::deposit,
            "withdraw" => AccountCommand::withdraw,
            _ => return Err(LedgerError::UnknownCommand(word.as_ref().to_string())),
        };

        let amount = words
            .next()
            .ok_or_else(|| LedgerError::MissingAmount(verb.clone()))?;
        let amount = amount
            .as_ref()
            .parse::<Money>()
            .map_err(|source| LedgerError::InvalidAmount {
                command: verb.clone(),
                source,
            })?;

        script.push(build(amount));
    }

    Ok(script)
}

/// Runs every command against one account instance, then commits and
/// rebuilds.
///
/// Refused commands are collected rather than aborting the run. Store and
/// replay failures abort it.
#[tracing::instrument(skip(handler, script), fields(commands = script.len()))]
pub async fn run_script<S: EventStore>(
    handler: &CommandHandler<S, Account>,
    account_id: &AggregateId,
    script: Vec<AccountCommand>,
) -> Result<Outcome, LedgerError> {
    let mut account = handler.rebuild(account_id).await?;
    let mut rejections = Vec::new();

    for command in script {
        if let Err(error) = account.handle(command.clone()) {
            tracing::warn!(%error, command = command.name(), "command rejected");
            rejections.push(Rejection { command, error });
        }
    }

    handler.flush(&mut account).await?;
    let rebuilt = handler.rebuild(account_id).await?;

    Ok(Outcome {
        account,
        rejections,
        rebuilt,
    })
}

/// Renders every stored event in append order.
///
/// Account events use their domain rendering; anything else falls back to
/// the envelope's own.
pub async fn audit_trail<S: EventStore>(store: &S) -> Result<Vec<String>, LedgerError> {
    let envelopes: Vec<_> = store.stream_all_events().await?.try_collect().await?;

    envelopes
        .into_iter()
        .map(|envelope| -> Result<String, LedgerError> {
            if envelope.aggregate_type == Account::aggregate_type() {
                let event: AccountEvent = serde_json::from_value(envelope.payload)?;
                Ok(event.to_string())
            } else {
                Ok(envelope.to_string())
            }
        })
        .collect()
}
