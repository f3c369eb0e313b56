//! Money Transfer
//!
//! Moves an amount between two accounts of the same currency as one atomic
//! unit of work:
//!
//! ```text
//! INSERT transfer → INSERT debit entry → INSERT credit entry
//!   → lock + update lower account id → lock + update higher account id
//!   → COMMIT
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Locking read**: every balance written is computed from the value read
//!    under the row lock in the same unit of work
//! 2. **Fixed lock order**: the lower account id is always locked first, so
//!    two transfers can never wait on each other in a cycle
//! 3. **No partial state**: any failure rolls back every row of the transfer
//! 4. **No internal retry**: a failed transfer is reported; resubmitting is
//!    the caller's decision

pub mod orchestrator;

mod integration_tests;

pub use orchestrator::{TransferOrchestrator, TransferParams, TransferResult, check_currency};
