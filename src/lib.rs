//! Bank Ledger - Double-Entry Money Transfer Core
//!
//! Accounts, ledger entries and transfers over PostgreSQL (or an in-memory
//! store), with an authenticated HTTP API.
//!
//! # Modules
//!
//! - [`ledger`] - Row types, storage traits, PostgreSQL and in-memory stores
//! - [`transfer`] - Atomic, deadlock-free transfer orchestration
//! - [`auth`] - Password hashing, access tokens, bearer middleware
//! - [`gateway`] - HTTP routes, handlers, OpenAPI docs
//! - [`db`] - Connection pool and schema setup
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

pub mod auth;
pub mod config;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod transfer;

// Convenient re-exports at crate root
pub use ledger::{
    Account, Currency, Entry, LedgerError, LedgerStore, LedgerTx, MemoryLedgerStore,
    PgLedgerStore, Precondition, Transfer, TxExecutor, User,
};
pub use transfer::{TransferOrchestrator, TransferParams, TransferResult};
