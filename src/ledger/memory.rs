//! In-process ledger store
//!
//! Same contract as [`PgLedgerStore`](super::postgres::PgLedgerStore):
//! - every account row has its own `tokio::sync::Mutex`; a locking read holds
//!   the owned guard until the transaction ends
//! - writes made inside a transaction are buffered and only become visible
//!   at commit
//! - identity sequences are never rolled back
//! - the schema constraints (unique keys, foreign keys, positive transfer
//!   amount) are enforced

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OwnedMutexGuard;

use super::error::LedgerError;
use super::models::{
    Account, CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    Entry, ListAccountsParams, ListEntriesParams, ListTransfersParams, Transfer, User,
    never_changed,
};
use super::store::{LedgerStore, LedgerTx};

#[derive(Default)]
struct Tables {
    users: BTreeMap<String, User>,
    accounts: BTreeMap<i64, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

impl Tables {
    fn is_account_referenced(&self, account_id: i64) -> bool {
        self.entries.values().any(|e| e.account_id == account_id)
            || self
                .transfers
                .values()
                .any(|t| t.from_account_id == account_id || t.to_account_id == account_id)
    }
}

struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    transfer_seq: AtomicI64,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        // Tables are only mutated after every check passed, so a poisoned
        // lock still guards consistent data.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock handle of an existing account row
    ///
    /// Entries are created on demand and dropped with the row, so the map
    /// never outgrows the accounts table. Lock order: tables, then row_locks.
    fn row_lock(&self, account_id: i64) -> Result<Arc<tokio::sync::Mutex<()>>, LedgerError> {
        let tables = self.tables();
        if !tables.accounts.contains_key(&account_id) {
            return Err(LedgerError::account_not_found(account_id));
        }
        let mut locks = self.row_locks();
        Ok(locks.entry(account_id).or_default().clone())
    }

    fn row_locks(&self) -> MutexGuard<'_, HashMap<i64, Arc<tokio::sync::Mutex<()>>>> {
        self.row_locks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// In-memory [`LedgerStore`] with row-level pessimistic locking
#[derive(Clone)]
pub struct MemoryLedgerStore {
    shared: Arc<Shared>,
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                account_seq: AtomicI64::new(1),
                entry_seq: AtomicI64::new(1),
                transfer_seq: AtomicI64::new(1),
            }),
        }
    }

    #[cfg(test)]
    fn row_lock_count(&self) -> usize {
        self.shared.row_locks().len()
    }

    /// Committed row counts: (entries, transfers)
    pub fn history_len(&self) -> (usize, usize) {
        let tables = self.shared.tables();
        (tables.entries.len(), tables.transfers.len())
    }
}

/// Transaction over a [`MemoryLedgerStore`]
pub struct MemoryLedgerTx {
    shared: Arc<Shared>,
    held: HashMap<i64, OwnedMutexGuard<()>>,
    transfers: Vec<Transfer>,
    entries: Vec<Entry>,
    balances: BTreeMap<i64, i64>,
}

impl MemoryLedgerTx {
    /// Acquire the row lock unless this transaction already holds it
    async fn lock_row(&mut self, account_id: i64) -> Result<(), LedgerError> {
        if self.held.contains_key(&account_id) {
            return Ok(());
        }
        let guard = self.shared.row_lock(account_id)?.lock_owned().await;
        self.held.insert(account_id, guard);
        Ok(())
    }

    /// The account as this transaction sees it (committed row + own writes)
    fn visible_account(&self, account_id: i64) -> Result<Account, LedgerError> {
        let mut account = self
            .shared
            .tables()
            .accounts
            .get(&account_id)
            .cloned()
            .ok_or_else(|| LedgerError::account_not_found(account_id))?;
        if let Some(balance) = self.balances.get(&account_id) {
            account.balance = *balance;
        }
        Ok(account)
    }

    fn check_accounts_exist(&self, account_ids: &[i64]) -> Result<(), LedgerError> {
        let tables = self.shared.tables();
        match account_ids
            .iter()
            .find(|id| !tables.accounts.contains_key(*id))
        {
            Some(missing) => Err(LedgerError::account_not_found(*missing)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, LedgerError> {
        if params.amount <= 0 {
            return Err(LedgerError::ConstraintViolation(format!(
                "transfers_amount_check: amount {} must be positive",
                params.amount
            )));
        }
        self.check_accounts_exist(&[params.from_account_id, params.to_account_id])?;

        let transfer = Transfer {
            id: self.shared.transfer_seq.fetch_add(1, Ordering::SeqCst),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, LedgerError> {
        self.check_accounts_exist(&[params.account_id])?;

        let entry = Entry {
            id: self.shared.entry_seq.fetch_add(1, Ordering::SeqCst),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn get_account_for_update(&mut self, account_id: i64) -> Result<Account, LedgerError> {
        self.lock_row(account_id).await?;
        self.visible_account(account_id)
    }

    async fn update_account_balance(
        &mut self,
        account_id: i64,
        balance: i64,
    ) -> Result<Account, LedgerError> {
        self.lock_row(account_id).await?;
        let mut account = self.visible_account(account_id)?;
        account.balance = balance;
        self.balances.insert(account_id, balance);
        Ok(account)
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        let mut tables = self.shared.tables();

        let dangling = self
            .balances
            .keys()
            .copied()
            .chain(self.entries.iter().map(|e| e.account_id))
            .chain(
                self.transfers
                    .iter()
                    .flat_map(|t| [t.from_account_id, t.to_account_id]),
            )
            .find(|id| !tables.accounts.contains_key(id));
        if let Some(account_id) = dangling {
            return Err(LedgerError::TransactionAborted(format!(
                "account {} was deleted before commit",
                account_id
            )));
        }

        for (account_id, balance) in &self.balances {
            if let Some(account) = tables.accounts.get_mut(account_id) {
                account.balance = *balance;
            }
        }
        for entry in &self.entries {
            tables.entries.insert(entry.id, entry.clone());
        }
        for transfer in &self.transfers {
            tables.transfers.insert(transfer.id, transfer.clone());
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, LedgerError> {
        Ok(Box::new(MemoryLedgerTx {
            shared: self.shared.clone(),
            held: HashMap::new(),
            transfers: Vec::new(),
            entries: Vec::new(),
            balances: BTreeMap::new(),
        }))
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<User, LedgerError> {
        let mut tables = self.shared.tables();
        if tables.users.contains_key(&params.username) {
            return Err(LedgerError::ConstraintViolation(format!(
                "users_pkey: username '{}' already exists",
                params.username
            )));
        }
        if tables.users.values().any(|u| u.email == params.email) {
            return Err(LedgerError::ConstraintViolation(format!(
                "users_email_key: email '{}' already exists",
                params.email
            )));
        }

        let user = User {
            username: params.username,
            password_hash: params.password_hash,
            name: params.name,
            last_name: params.last_name,
            email: params.email,
            password_changed_at: never_changed(),
            created_at: Utc::now(),
        };
        tables.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, username: &str) -> Result<User, LedgerError> {
        self.shared
            .tables()
            .users
            .get(username)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("user", username))
    }

    async fn create_account(&self, params: CreateAccountParams) -> Result<Account, LedgerError> {
        let mut tables = self.shared.tables();
        if !tables.users.contains_key(&params.owner) {
            return Err(LedgerError::ConstraintViolation(format!(
                "accounts_owner_fkey: user '{}' does not exist",
                params.owner
            )));
        }
        if tables
            .accounts
            .values()
            .any(|a| a.owner == params.owner && a.currency == params.currency)
        {
            return Err(LedgerError::ConstraintViolation(format!(
                "owner_currency_key: '{}' already has a {} account",
                params.owner, params.currency
            )));
        }

        let account = Account {
            id: self.shared.account_seq.fetch_add(1, Ordering::SeqCst),
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, account_id: i64) -> Result<Account, LedgerError> {
        self.shared
            .tables()
            .accounts
            .get(&account_id)
            .cloned()
            .ok_or_else(|| LedgerError::account_not_found(account_id))
    }

    async fn list_accounts(&self, params: ListAccountsParams) -> Result<Vec<Account>, LedgerError> {
        Ok(self
            .shared
            .tables()
            .accounts
            .values()
            .filter(|a| a.owner == params.owner)
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete_account(&self, account_id: i64) -> Result<(), LedgerError> {
        let _row = self.shared.row_lock(account_id)?.lock_owned().await;

        let mut tables = self.shared.tables();
        if !tables.accounts.contains_key(&account_id) {
            return Err(LedgerError::account_not_found(account_id));
        }
        if tables.is_account_referenced(account_id) {
            return Err(LedgerError::ConstraintViolation(format!(
                "account {} is still referenced by entries or transfers",
                account_id
            )));
        }
        tables.accounts.remove(&account_id);
        self.shared.row_locks().remove(&account_id);
        Ok(())
    }

    async fn get_entry(&self, entry_id: i64) -> Result<Entry, LedgerError> {
        self.shared
            .tables()
            .entries
            .get(&entry_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("entry", entry_id))
    }

    async fn list_entries(&self, params: ListEntriesParams) -> Result<Vec<Entry>, LedgerError> {
        Ok(self
            .shared
            .tables()
            .entries
            .values()
            .filter(|e| e.account_id == params.account_id)
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_transfer(&self, transfer_id: i64) -> Result<Transfer, LedgerError> {
        self.shared
            .tables()
            .transfers
            .get(&transfer_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("transfer", transfer_id))
    }

    async fn list_transfers(
        &self,
        params: ListTransfersParams,
    ) -> Result<Vec<Transfer>, LedgerError> {
        Ok(self
            .shared
            .tables()
            .transfers
            .values()
            .filter(|t| {
                t.from_account_id == params.from_account_id
                    || t.to_account_id == params.to_account_id
            })
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}
