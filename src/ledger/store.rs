//! Ledger Store and Transaction Executor
//!
//! [`LedgerStore`] is the seam between the ledger logic and the storage
//! engine. Multi-row mutations go through a [`LedgerTx`] obtained from
//! [`LedgerStore::begin`] and driven by [`TxExecutor::run`]; everything else
//! is an isolated point operation on the store itself.
//!
//! # Locking
//!
//! [`LedgerTx::get_account_for_update`] is a pessimistic locking read: the
//! row stays locked until the transaction commits, rolls back or is dropped.
//! A second locking read of the same row from another transaction blocks
//! until then.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use super::error::LedgerError;
use super::models::{
    Account, CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams, Transfer, User,
};

/// Transaction-scoped handle to the store
///
/// Dropping an unfinished transaction rolls it back.
#[async_trait]
pub trait LedgerTx: Send {
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, LedgerError>;

    /// Read an account and lock its row until the transaction ends
    async fn get_account_for_update(&mut self, account_id: i64) -> Result<Account, LedgerError>;

    async fn update_account_balance(
        &mut self,
        account_id: i64,
        balance: i64,
    ) -> Result<Account, LedgerError>;

    async fn commit(self: Box<Self>) -> Result<(), LedgerError>;

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError>;
}

/// Durable storage for users, accounts, entries and transfers
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a new atomic unit of work
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError>;

    async fn create_user(&self, params: CreateUserParams) -> Result<User, LedgerError>;

    async fn get_user(&self, username: &str) -> Result<User, LedgerError>;

    async fn create_account(&self, params: CreateAccountParams) -> Result<Account, LedgerError>;

    /// Plain (non-locking) read
    async fn get_account(&self, account_id: i64) -> Result<Account, LedgerError>;

    async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>, LedgerError>;

    async fn delete_account(&self, account_id: i64) -> Result<(), LedgerError>;

    async fn get_entry(&self, entry_id: i64) -> Result<Entry, LedgerError>;

    async fn list_entries(&self, params: ListEntriesParams) -> Result<Vec<Entry>, LedgerError>;

    async fn get_transfer(&self, transfer_id: i64) -> Result<Transfer, LedgerError>;

    async fn list_transfers(
        &self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, LedgerError>;

    async fn health_check(&self) -> Result<(), LedgerError>;
}

/// All-or-nothing execution of a sequence of store operations
///
/// Exactly one storage transaction is opened and closed per [`run`](Self::run).
/// The unit of work must not open another top-level unit itself.
#[derive(Clone)]
pub struct TxExecutor {
    store: Arc<dyn LedgerStore>,
    unit_timeout: Option<Duration>,
}

impl TxExecutor {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            unit_timeout: None,
        }
    }

    /// Abort (and roll back) any unit of work that runs longer than `limit`
    pub fn with_unit_timeout(mut self, limit: Duration) -> Self {
        self.unit_timeout = Some(limit);
        self
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Run `unit` inside one transaction
    ///
    /// - `unit` succeeds: commit; a commit failure is the result.
    /// - `unit` fails or times out: roll back and return the unit's error, or
    ///   [`LedgerError::RollbackFailed`] carrying both errors if the rollback
    ///   fails too.
    ///
    /// Dropping the returned future before it completes drops the open
    /// transaction, which rolls it back.
    pub async fn run<T, F>(&self, unit: F) -> Result<T, LedgerError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut dyn LedgerTx) -> BoxFuture<'t, Result<T, LedgerError>> + Send,
    {
        let mut tx = self.store.begin().await?;
        debug!("Unit of work started");

        let outcome = match self.unit_timeout {
            Some(limit) => match tokio::time::timeout(limit, unit(&mut *tx)).await {
                Ok(result) => result,
                Err(_) => Err(LedgerError::TransactionAborted(format!(
                    "unit of work cancelled after {}ms",
                    limit.as_millis()
                ))),
            },
            None => unit(&mut *tx).await,
        };

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                debug!("Unit of work committed");
                Ok(value)
            }
            Err(cause) => {
                warn!(error = %cause, "Unit of work failed - rolling back");
                match tx.rollback().await {
                    Ok(()) => Err(cause),
                    Err(rollback) => {
                        error!(
                            error = %cause,
                            rollback_error = %rollback,
                            "Rollback failed - persisted state uncertain"
                        );
                        Err(LedgerError::RollbackFailed {
                            cause: Box::new(cause),
                            rollback: Box::new(rollback),
                        })
                    }
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockLedgerStore;
    use super::*;

    fn executor(store: &Arc<MockLedgerStore>) -> TxExecutor {
        TxExecutor::new(store.clone())
    }

    #[tokio::test]
    async fn test_commits_on_success() {
        let store = Arc::new(MockLedgerStore::new().with_account(1, 100, "BRL"));

        let balance = executor(&store)
            .run(|tx| {
                Box::pin(async move {
                    let account = tx.get_account_for_update(1).await?;
                    Ok(account.balance)
                })
            })
            .await
            .unwrap();

        assert_eq!(balance, 100);
        assert_eq!(store.commit_count(), 1);
        assert_eq!(store.rollback_count(), 0);
        assert_eq!(
            store.calls(),
            vec!["begin", "get_account_for_update:1", "commit"]
        );
    }

    #[tokio::test]
    async fn test_rolls_back_and_returns_original_error() {
        let store = Arc::new(MockLedgerStore::new());

        let err = executor(&store)
            .run(|tx| Box::pin(async move { tx.get_account_for_update(99).await }))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::NotFound { .. }));
        assert_eq!(store.commit_count(), 0);
        assert_eq!(store.rollback_count(), 1);
    }

    #[tokio::test]
    async fn test_rollback_failure_carries_both_errors() {
        let store = Arc::new(MockLedgerStore::new());
        store.fail_on("rollback");

        let err = executor(&store)
            .run(|tx| Box::pin(async move { tx.get_account_for_update(5).await }))
            .await
            .unwrap_err();

        match err {
            LedgerError::RollbackFailed { cause, rollback } => {
                assert!(matches!(*cause, LedgerError::NotFound { .. }));
                assert!(rollback.to_string().contains("scripted rollback failure"));
            }
            other => panic!("expected RollbackFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_commit_failure_is_surfaced() {
        let store = Arc::new(MockLedgerStore::new().with_account(1, 10, "USD"));
        store.fail_on("commit");

        let err = executor(&store)
            .run(|tx| Box::pin(async move { tx.get_account_for_update(1).await }))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("scripted commit failure"));
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_begin_failure_runs_nothing() {
        let store = Arc::new(MockLedgerStore::new());
        store.fail_on("begin");

        let result = executor(&store)
            .run(|tx| Box::pin(async move { tx.get_account_for_update(1).await }))
            .await;

        assert!(result.is_err());
        assert_eq!(store.calls(), vec!["begin"]);
    }

    #[tokio::test]
    async fn test_timeout_rolls_back_instead_of_committing() {
        let store = Arc::new(MockLedgerStore::new().with_account(1, 10, "USD"));

        let err = executor(&store)
            .with_unit_timeout(Duration::from_millis(20))
            .run(|tx| {
                Box::pin(async move {
                    tx.get_account_for_update(1).await?;
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::TransactionAborted(_)));
        assert_eq!(store.commit_count(), 0);
        assert_eq!(store.rollback_count(), 1);
    }
}
