//! Concurrency Tests for Transfers
//!
//! Every scenario runs against the in-memory store and, with
//! `cargo test -- --ignored`, against a live PostgreSQL database.

#[cfg(test)]
mod integration_tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use uuid::Uuid;

    use crate::db::Database;
    use crate::db::test_support::database_url;
    use crate::ledger::error::{LedgerError, Precondition};
    use crate::ledger::memory::MemoryLedgerStore;
    use crate::ledger::models::{
        Account, CreateAccountParams, CreateUserParams, ListEntriesParams, ListTransfersParams,
    };
    use crate::ledger::postgres::PgLedgerStore;
    use crate::ledger::store::LedgerStore;
    use crate::transfer::{TransferOrchestrator, TransferParams};

    /// Deadlock guard for the alternating-direction scenario
    const DEADLOCK_TIMEOUT: Duration = Duration::from_secs(10);

    struct TestHarness {
        store: Arc<dyn LedgerStore>,
        orchestrator: Arc<TransferOrchestrator>,
    }

    impl TestHarness {
        fn new(store: Arc<dyn LedgerStore>) -> Self {
            let orchestrator = Arc::new(TransferOrchestrator::new(store.clone()));
            Self {
                store,
                orchestrator,
            }
        }

        fn memory() -> Self {
            Self::new(Arc::new(MemoryLedgerStore::new()))
        }

        async fn postgres() -> Self {
            let db = Database::connect(&database_url(), 20)
                .await
                .expect("Failed to connect");
            db.init_schema().await.expect("Failed to init schema");
            Self::new(Arc::new(PgLedgerStore::new(db.pool().clone())))
        }

        /// A fresh user owning one account in `currency`
        async fn account(&self, balance: i64, currency: &str) -> Account {
            let username = format!("u{}", Uuid::new_v4().simple());
            self.store
                .create_user(CreateUserParams {
                    username: username.clone(),
                    password_hash: "hash".to_string(),
                    name: "Test".to_string(),
                    last_name: "User".to_string(),
                    email: format!("{}@example.com", username),
                })
                .await
                .expect("create user");
            self.store
                .create_account(CreateAccountParams {
                    owner: username,
                    balance,
                    currency: currency.to_string(),
                })
                .await
                .expect("create account")
        }

        async fn balance(&self, account_id: i64) -> i64 {
            self.store.get_account(account_id).await.unwrap().balance
        }

        /// (entries, transfers) committed against an account
        async fn history(&self, account_id: i64) -> (usize, usize) {
            let entries = self
                .store
                .list_entries(ListEntriesParams {
                    account_id,
                    limit: 1000,
                    offset: 0,
                })
                .await
                .unwrap();
            let transfers = self
                .store
                .list_transfers(ListTransfersParams {
                    from_account_id: account_id,
                    to_account_id: account_id,
                    limit: 1000,
                    offset: 0,
                })
                .await
                .unwrap();
            (entries.len(), transfers.len())
        }
    }

    fn params(from: i64, to: i64, amount: i64) -> TransferParams {
        TransferParams {
            from_account_id: from,
            to_account_id: to,
            amount,
        }
    }

    // ========================================================================
    // Scenarios
    // ========================================================================

    async fn concrete_transfer(h: TestHarness) {
        let a = h.account(100, "BRL").await;
        let b = h.account(50, "BRL").await;

        let result = h
            .orchestrator
            .checked_transfer(params(a.id, b.id, 30), "BRL")
            .await
            .unwrap();

        assert_eq!(result.from_account.balance, 70);
        assert_eq!(result.to_account.balance, 80);
        assert_eq!(result.from_entry.amount, -30);
        assert_eq!(result.to_entry.amount, 30);
        assert_eq!(result.transfer.amount, 30);
        assert_eq!(h.balance(a.id).await, 70);
        assert_eq!(h.balance(b.id).await, 80);
        assert_eq!(h.history(a.id).await, (1, 1));
        assert_eq!(h.history(b.id).await, (1, 1));
    }

    /// N concurrent A→B transfers: each one observes a distinct pre-update
    /// balance, and the totals move by exactly N × amount
    async fn concurrent_same_direction(h: TestHarness) {
        const N: i64 = 5;
        const AMOUNT: i64 = 10;

        let a = h.account(1_000, "USD").await;
        let b = h.account(1_000, "USD").await;

        let mut handles = Vec::new();
        for _ in 0..N {
            let orchestrator = h.orchestrator.clone();
            let p = params(a.id, b.id, AMOUNT);
            handles.push(tokio::spawn(async move { orchestrator.transfer(p).await }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            let result = handle.await.unwrap().unwrap();

            assert_eq!(result.transfer.from_account_id, a.id);
            assert_eq!(result.transfer.to_account_id, b.id);
            assert_eq!(result.from_entry.amount, -AMOUNT);
            assert_eq!(result.to_entry.amount, AMOUNT);

            let from_diff = a.balance - result.from_account.balance;
            let to_diff = result.to_account.balance - b.balance;
            assert_eq!(from_diff, to_diff);
            assert_eq!(from_diff % AMOUNT, 0);

            let k = from_diff / AMOUNT;
            assert!((1..=N).contains(&k), "k = {} out of range", k);
            assert!(seen.insert(k), "k = {} observed twice", k);
        }

        assert_eq!(h.balance(a.id).await, a.balance - N * AMOUNT);
        assert_eq!(h.balance(b.id).await, b.balance + N * AMOUNT);
    }

    /// Transfers in both directions between the same pair never deadlock
    async fn concurrent_opposite_directions(h: TestHarness) {
        const N: usize = 10;
        const AMOUNT: i64 = 10;

        let a = h.account(500, "EUR").await;
        let b = h.account(500, "EUR").await;

        let mut handles = Vec::new();
        for i in 0..N {
            let orchestrator = h.orchestrator.clone();
            let p = if i % 2 == 0 {
                params(a.id, b.id, AMOUNT)
            } else {
                params(b.id, a.id, AMOUNT)
            };
            handles.push(tokio::spawn(async move { orchestrator.transfer(p).await }));
        }

        let all = async {
            for handle in handles {
                handle.await.unwrap().unwrap();
            }
        };
        tokio::time::timeout(DEADLOCK_TIMEOUT, all)
            .await
            .expect("transfers deadlocked");

        assert_eq!(h.balance(a.id).await, a.balance);
        assert_eq!(h.balance(b.id).await, b.balance);
    }

    async fn nonexistent_account(h: TestHarness) {
        let a = h.account(100, "BRL").await;
        let missing = i64::MAX - 1;

        for p in [params(a.id, missing, 10), params(missing, a.id, 10)] {
            let err = h.orchestrator.transfer(p).await.unwrap_err();
            assert!(
                matches!(err, LedgerError::NotFound { entity: "account", .. }),
                "got {:?}",
                err
            );
        }

        assert_eq!(h.balance(a.id).await, 100);
        assert_eq!(h.history(a.id).await, (0, 0));
    }

    async fn currency_mismatch(h: TestHarness) {
        let a = h.account(100, "BRL").await;
        let b = h.account(100, "USD").await;

        let err = h
            .orchestrator
            .checked_transfer(params(a.id, b.id, 10), "BRL")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LedgerError::PreconditionFailed(Precondition::CurrencyMismatch { .. })
        ));
        assert_eq!(h.history(a.id).await, (0, 0));
        assert_eq!(h.history(b.id).await, (0, 0));
        assert_eq!(h.balance(a.id).await, 100);
        assert_eq!(h.balance(b.id).await, 100);
    }

    async fn timed_out_transfer_commits_nothing(h: TestHarness) {
        let a = h.account(100, "BRL").await;
        let b = h.account(100, "BRL").await;

        // Hold the lock on the lower id so the transfer stalls on it
        let mut blocker = h.store.begin().await.unwrap();
        blocker.get_account_for_update(a.id.min(b.id)).await.unwrap();

        // Released well after the transfer gave up; PostgreSQL only runs the
        // transfer's ROLLBACK once its blocked locking read returns.
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            blocker.rollback().await.unwrap();
        });

        let orchestrator = TransferOrchestrator::new(h.store.clone())
            .with_unit_timeout(Duration::from_millis(100));
        let err = orchestrator
            .transfer(params(a.id, b.id, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::TransactionAborted(_)));

        release.await.unwrap();
        assert_eq!(h.balance(a.id).await, 100);
        assert_eq!(h.balance(b.id).await, 100);
        assert_eq!(h.history(a.id).await, (0, 0));
    }

    // ========================================================================
    // In-memory store
    // ========================================================================

    #[tokio::test]
    async fn test_memory_concrete_transfer() {
        concrete_transfer(TestHarness::memory()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_memory_concurrent_same_direction() {
        concurrent_same_direction(TestHarness::memory()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_memory_concurrent_opposite_directions() {
        concurrent_opposite_directions(TestHarness::memory()).await;
    }

    #[tokio::test]
    async fn test_memory_nonexistent_account() {
        nonexistent_account(TestHarness::memory()).await;
    }

    #[tokio::test]
    async fn test_memory_currency_mismatch() {
        currency_mismatch(TestHarness::memory()).await;
    }

    #[tokio::test]
    async fn test_memory_timed_out_transfer_commits_nothing() {
        timed_out_transfer_commits_nothing(TestHarness::memory()).await;
    }

    // ========================================================================
    // PostgreSQL
    // ========================================================================

    #[tokio::test]
    #[ignore = "requires PostgreSQL database"]
    async fn test_pg_concrete_transfer() {
        concrete_transfer(TestHarness::postgres().await).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires PostgreSQL database"]
    async fn test_pg_concurrent_same_direction() {
        concurrent_same_direction(TestHarness::postgres().await).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires PostgreSQL database"]
    async fn test_pg_concurrent_opposite_directions() {
        concurrent_opposite_directions(TestHarness::postgres().await).await;
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL database"]
    async fn test_pg_nonexistent_account() {
        nonexistent_account(TestHarness::postgres().await).await;
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL database"]
    async fn test_pg_currency_mismatch() {
        currency_mismatch(TestHarness::postgres().await).await;
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL database"]
    async fn test_pg_timed_out_transfer_commits_nothing() {
        timed_out_transfer_commits_nothing(TestHarness::postgres().await).await;
    }
}
