//! Ledger
//!
//! Users, accounts, entries and transfers, and the storage they live in.
//!
//! # Components
//!
//! - [`store::LedgerStore`] / [`store::LedgerTx`] - storage seam
//! - [`store::TxExecutor`] - all-or-nothing unit of work
//! - [`postgres::PgLedgerStore`] - PostgreSQL store (row locks via `FOR NO KEY UPDATE`)
//! - [`memory::MemoryLedgerStore`] - in-process store with the same contract

pub mod currency;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use currency::{Currency, CurrencyError};
pub use error::{LedgerError, Precondition};
pub use memory::MemoryLedgerStore;
pub use models::{Account, Entry, Transfer, User};
pub use postgres::PgLedgerStore;
pub use store::{LedgerStore, LedgerTx, TxExecutor};
