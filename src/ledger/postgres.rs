//! PostgreSQL ledger store
//!
//! Transactions are `sqlx::Transaction`s: dropping one without committing
//! rolls it back on the connection before it returns to the pool.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::error::LedgerError;
use super::models::{
    Account, CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams, Transfer, User,
};
use super::store::{LedgerStore, LedgerTx};

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";

/// [`LedgerStore`] backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// One open PostgreSQL transaction
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError> {
        sqlx::query_as::<_, Transfer>(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            LedgerError::from_account_reference(e, &[params.from_account_id, params.to_account_id])
        })
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, LedgerError> {
        sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(params.account_id)
        .bind(params.amount)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| LedgerError::from_account_reference(e, &[params.account_id]))
    }

    async fn get_account_for_update(&mut self, account_id: i64) -> Result<Account, LedgerError> {
        // NO KEY UPDATE: excludes other locking readers and writers of the row
        // but not the KEY SHARE locks that entry/transfer inserts take through
        // their foreign keys.
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE id = $1 LIMIT 1 FOR NO KEY UPDATE",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    async fn update_account_balance(
        &mut self,
        account_id: i64,
        balance: i64,
    ) -> Result<Account, LedgerError> {
        sqlx::query_as::<_, Account>(&format!(
            "UPDATE accounts SET balance = $2 WHERE id = $1 RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .bind(balance)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx
            .commit()
            .await
            .map_err(LedgerError::from_commit)
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<User, LedgerError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, name, last_name, email)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING username, password_hash, name, last_name, email,
                      password_changed_at, created_at
            "#,
        )
        .bind(&params.username)
        .bind(&params.password_hash)
        .bind(&params.name)
        .bind(&params.last_name)
        .bind(&params.email)
        .fetch_one(&self.pool)
        .await?;

        debug!(username = %user.username, "User created");
        Ok(user)
    }

    async fn get_user(&self, username: &str) -> Result<User, LedgerError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT username, password_hash, name, last_name, email,
                   password_changed_at, created_at
            FROM users WHERE username = $1 LIMIT 1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::not_found("user", username))
    }

    async fn create_account(&self, params: CreateAccountParams) -> Result<Account, LedgerError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3) RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(&params.owner)
        .bind(params.balance)
        .bind(&params.currency)
        .fetch_one(&self.pool)
        .await?;

        debug!(account_id = account.id, owner = %account.owner, "Account created");
        Ok(account)
    }

    async fn get_account(&self, account_id: i64) -> Result<Account, LedgerError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE id = $1 LIMIT 1",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>, LedgerError> {
        let rows = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE owner = $1 ORDER BY id LIMIT $2 OFFSET $3",
            ACCOUNT_COLUMNS
        ))
        .bind(&params.owner)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn delete_account(&self, account_id: i64) -> Result<(), LedgerError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::account_not_found(account_id));
        }
        Ok(())
    }

    async fn get_entry(&self, entry_id: i64) -> Result<Entry, LedgerError> {
        sqlx::query_as::<_, Entry>(
            "SELECT id, account_id, amount, created_at FROM entries WHERE id = $1 LIMIT 1",
        )
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::not_found("entry", entry_id))
    }

    async fn list_entries(&self, params: ListEntriesParams) -> Result<Vec<Entry>, LedgerError> {
        let rows = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, account_id, amount, created_at FROM entries
            WHERE account_id = $1
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(params.account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn get_transfer(&self, transfer_id: i64) -> Result<Transfer, LedgerError> {
        sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers WHERE id = $1 LIMIT 1
            "#,
        )
        .bind(transfer_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| LedgerError::not_found("transfer", transfer_id))
    }

    async fn list_transfers(
        &self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, LedgerError> {
        let rows = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE from_account_id = $1 OR to_account_id = $2
            ORDER BY id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
