//! Transfer Orchestrator
//!
//! Drives the multi-row transfer algorithm through one [`TxExecutor`] unit.
//! Holds no state of its own besides the store handle.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, info_span};
use utoipa::ToSchema;

use crate::ledger::error::{LedgerError, Precondition};
use crate::ledger::models::{Account, CreateEntryParams, CreateTransferParams, Entry, Transfer};
use crate::ledger::store::{LedgerStore, LedgerTx, TxExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

/// Everything one committed transfer produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_entry: Entry,
    pub to_entry: Entry,
    pub from_account: Account,
    pub to_account: Account,
}

#[derive(Clone)]
pub struct TransferOrchestrator {
    executor: TxExecutor,
}

impl TransferOrchestrator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            executor: TxExecutor::new(store),
        }
    }

    /// Roll back any transfer still running after `limit`
    pub fn with_unit_timeout(mut self, limit: Duration) -> Self {
        self.executor = self.executor.with_unit_timeout(limit);
        self
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        self.executor.store()
    }

    /// Execute a transfer
    ///
    /// The accounts are expected to share a currency; see
    /// [`checked_transfer`](Self::checked_transfer) for the variant that
    /// verifies it.
    pub async fn transfer(&self, params: TransferParams) -> Result<TransferResult, LedgerError> {
        if params.amount <= 0 {
            return Err(Precondition::InvalidAmount(params.amount).into());
        }

        let span = info_span!(
            "transfer",
            from_account_id = params.from_account_id,
            to_account_id = params.to_account_id,
            amount = params.amount
        );

        async move {
            let result = self
                .executor
                .run(move |tx| Box::pin(execute(tx, params)))
                .await?;

            info!(
                transfer_id = result.transfer.id,
                from_balance = result.from_account.balance,
                to_balance = result.to_account.balance,
                "Transfer committed"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Load both accounts and check they are held in `currency`
    ///
    /// Plain reads, outside of any unit of work: nothing is locked or written.
    pub async fn load_accounts(
        &self,
        params: &TransferParams,
        currency: &str,
    ) -> Result<(Account, Account), LedgerError> {
        if params.amount <= 0 {
            return Err(Precondition::InvalidAmount(params.amount).into());
        }

        let from_account = self.load_account(params.from_account_id, currency).await?;
        let to_account = self.load_account(params.to_account_id, currency).await?;

        Ok((from_account, to_account))
    }

    /// Plain read of one account, checked to be held in `currency`
    pub async fn load_account(
        &self,
        account_id: i64,
        currency: &str,
    ) -> Result<Account, LedgerError> {
        let account = self.store().get_account(account_id).await?;
        check_currency(&account, currency)?;
        Ok(account)
    }

    /// [`transfer`](Self::transfer) after verifying both accounts exist and
    /// are held in `currency`
    pub async fn checked_transfer(
        &self,
        params: TransferParams,
        currency: &str,
    ) -> Result<TransferResult, LedgerError> {
        self.load_accounts(&params, currency).await?;
        self.transfer(params).await
    }
}

/// `PreconditionFailed(CurrencyMismatch)` unless `account` is held in `currency`
pub fn check_currency(account: &Account, currency: &str) -> Result<(), LedgerError> {
    if account.currency != currency {
        return Err(Precondition::CurrencyMismatch {
            account_id: account.id,
            requested: currency.to_string(),
            held: account.currency.clone(),
        }
        .into());
    }
    Ok(())
}

/// The unit of work of one transfer
async fn execute(
    tx: &mut dyn LedgerTx,
    params: TransferParams,
) -> Result<TransferResult, LedgerError> {
    let TransferParams {
        from_account_id,
        to_account_id,
        amount,
    } = params;

    let transfer = tx
        .create_transfer(CreateTransferParams {
            from_account_id,
            to_account_id,
            amount,
        })
        .await?;
    debug!(transfer_id = transfer.id, "Transfer row created");

    let from_entry = tx
        .create_entry(CreateEntryParams {
            account_id: from_account_id,
            amount: -amount,
        })
        .await?;
    let to_entry = tx
        .create_entry(CreateEntryParams {
            account_id: to_account_id,
            amount,
        })
        .await?;

    let (from_account, to_account) = if from_account_id == to_account_id {
        let account = add_money(tx, from_account_id, 0).await?;
        (account.clone(), account)
    } else if from_account_id < to_account_id {
        let from_account = add_money(tx, from_account_id, -amount).await?;
        let to_account = add_money(tx, to_account_id, amount).await?;
        (from_account, to_account)
    } else {
        let to_account = add_money(tx, to_account_id, amount).await?;
        let from_account = add_money(tx, from_account_id, -amount).await?;
        (from_account, to_account)
    };

    Ok(TransferResult {
        transfer,
        from_entry,
        to_entry,
        from_account,
        to_account,
    })
}

/// Lock an account row and apply `delta` to the balance read under the lock
async fn add_money(
    tx: &mut dyn LedgerTx,
    account_id: i64,
    delta: i64,
) -> Result<Account, LedgerError> {
    let locked = tx.get_account_for_update(account_id).await?;
    let balance = locked.balance.checked_add(delta).ok_or_else(|| {
        LedgerError::ConstraintViolation(format!(
            "balance of account {} would overflow",
            account_id
        ))
    })?;
    tx.update_account_balance(account_id, balance).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::store::mock::MockLedgerStore;

    fn params(from: i64, to: i64, amount: i64) -> TransferParams {
        TransferParams {
            from_account_id: from,
            to_account_id: to,
            amount,
        }
    }

    fn orchestrator(store: &Arc<MockLedgerStore>) -> TransferOrchestrator {
        TransferOrchestrator::new(store.clone())
    }

    #[tokio::test]
    async fn test_transfer_result() {
        let store = Arc::new(
            MockLedgerStore::new()
                .with_account(1, 100, "BRL")
                .with_account(2, 50, "BRL"),
        );

        let result = orchestrator(&store)
            .transfer(params(1, 2, 30))
            .await
            .unwrap();

        assert_eq!(result.transfer.amount, 30);
        assert_eq!(result.transfer.from_account_id, 1);
        assert_eq!(result.transfer.to_account_id, 2);
        assert_eq!(result.from_entry.account_id, 1);
        assert_eq!(result.from_entry.amount, -30);
        assert_eq!(result.to_entry.account_id, 2);
        assert_eq!(result.to_entry.amount, 30);
        assert_eq!(result.from_account.balance, 70);
        assert_eq!(result.to_account.balance, 80);
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn test_call_sequence_locks_lower_id_first() {
        let store = Arc::new(
            MockLedgerStore::new()
                .with_account(1, 100, "BRL")
                .with_account(2, 50, "BRL"),
        );

        orchestrator(&store)
            .transfer(params(2, 1, 10))
            .await
            .unwrap();

        assert_eq!(
            store.calls(),
            vec![
                "begin",
                "create_transfer:2->1:10",
                "create_entry:2:-10",
                "create_entry:1:10",
                "get_account_for_update:1",
                "update_account_balance:1:110",
                "get_account_for_update:2",
                "update_account_balance:2:40",
                "commit",
            ]
        );
    }

    #[tokio::test]
    async fn test_result_sides_follow_direction_not_lock_order() {
        let store = Arc::new(
            MockLedgerStore::new()
                .with_account(3, 10, "USD")
                .with_account(8, 90, "USD"),
        );

        let result = orchestrator(&store)
            .transfer(params(8, 3, 25))
            .await
            .unwrap();

        assert_eq!(result.from_account.id, 8);
        assert_eq!(result.from_account.balance, 65);
        assert_eq!(result.to_account.id, 3);
        assert_eq!(result.to_account.balance, 35);
    }

    #[tokio::test]
    async fn test_self_transfer_locks_row_once() {
        let store = Arc::new(MockLedgerStore::new().with_account(4, 100, "EUR"));

        let result = orchestrator(&store)
            .transfer(params(4, 4, 15))
            .await
            .unwrap();

        assert_eq!(result.from_account.balance, 100);
        assert_eq!(result.from_account, result.to_account);
        let locks = store
            .calls()
            .iter()
            .filter(|c| c.starts_with("get_account_for_update"))
            .count();
        assert_eq!(locks, 1);
    }

    #[tokio::test]
    async fn test_non_positive_amount_touches_nothing() {
        let store = Arc::new(MockLedgerStore::new().with_account(1, 100, "BRL"));

        for amount in [0, -5] {
            let err = orchestrator(&store)
                .transfer(params(1, 2, amount))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                LedgerError::PreconditionFailed(Precondition::InvalidAmount(a)) if a == amount
            ));
        }
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_account_rolls_back() {
        let store = Arc::new(MockLedgerStore::new().with_account(1, 100, "BRL"));

        let err = orchestrator(&store)
            .transfer(params(1, 9, 10))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::NotFound { entity: "account", .. }));
        assert_eq!(store.commit_count(), 0);
        assert_eq!(store.rollback_count(), 1);
        assert_eq!(store.calls().last().map(String::as_str), Some("rollback"));
    }

    #[tokio::test]
    async fn test_entry_failure_stops_before_locking() {
        let store = Arc::new(
            MockLedgerStore::new()
                .with_account(1, 100, "BRL")
                .with_account(2, 50, "BRL"),
        );
        store.fail_on("create_entry");

        let err = orchestrator(&store)
            .transfer(params(1, 2, 10))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Database(_)));
        assert!(
            !store
                .calls()
                .iter()
                .any(|c| c.starts_with("get_account_for_update"))
        );
        assert_eq!(store.rollback_count(), 1);
    }

    #[tokio::test]
    async fn test_rollback_failure_surfaces_both_errors() {
        let store = Arc::new(
            MockLedgerStore::new()
                .with_account(1, 100, "BRL")
                .with_account(2, 50, "BRL"),
        );
        store.fail_on("update_account_balance");
        store.fail_on("rollback");

        let err = orchestrator(&store)
            .transfer(params(1, 2, 10))
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("scripted update_account_balance failure"));
        assert!(msg.contains("scripted rollback failure"));
    }

    #[tokio::test]
    async fn test_balance_overflow_is_rejected() {
        let store = Arc::new(
            MockLedgerStore::new()
                .with_account(1, 100, "BRL")
                .with_account(2, i64::MAX, "BRL"),
        );

        let err = orchestrator(&store)
            .transfer(params(1, 2, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::ConstraintViolation(_)));
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_currency_mismatch_rejected_before_unit_of_work() {
        let store = Arc::new(
            MockLedgerStore::new()
                .with_account(1, 100, "BRL")
                .with_account(2, 50, "USD"),
        );

        let err = orchestrator(&store)
            .checked_transfer(params(1, 2, 10), "BRL")
            .await
            .unwrap_err();

        match err {
            LedgerError::PreconditionFailed(Precondition::CurrencyMismatch {
                account_id,
                requested,
                held,
            }) => {
                assert_eq!(account_id, 2);
                assert_eq!(requested, "BRL");
                assert_eq!(held, "USD");
            }
            other => panic!("expected CurrencyMismatch, got {:?}", other),
        }
        assert_eq!(store.begin_count(), 0);
        assert_eq!(store.calls(), vec!["get_account:1", "get_account:2"]);
    }

    #[tokio::test]
    async fn test_load_account_reads_one_row() {
        let store = Arc::new(MockLedgerStore::new().with_account(1, 100, "BRL"));
        let orchestrator = orchestrator(&store);

        let account = orchestrator.load_account(1, "BRL").await.unwrap();
        assert_eq!(account.balance, 100);

        let err = orchestrator.load_account(1, "EUR").await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::PreconditionFailed(Precondition::CurrencyMismatch { account_id: 1, .. })
        ));
        assert_eq!(store.calls(), vec!["get_account:1", "get_account:1"]);
        assert_eq!(store.begin_count(), 0);
    }

    #[tokio::test]
    async fn test_checked_transfer_missing_account() {
        let store = Arc::new(MockLedgerStore::new().with_account(1, 100, "BRL"));

        let err = orchestrator(&store)
            .checked_transfer(params(7, 1, 10), "BRL")
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::NotFound { .. }));
        assert_eq!(store.begin_count(), 0);
    }

    #[tokio::test]
    async fn test_checked_transfer_commits() {
        let store = Arc::new(
            MockLedgerStore::new()
                .with_account(1, 100, "BRL")
                .with_account(2, 50, "BRL"),
        );

        let result = orchestrator(&store)
            .checked_transfer(params(1, 2, 30), "BRL")
            .await
            .unwrap();

        assert_eq!(result.from_account.balance, 70);
        assert_eq!(result.to_account.balance, 80);
        assert_eq!(store.begin_count(), 1);
        assert_eq!(store.commit_count(), 1);
    }
}
