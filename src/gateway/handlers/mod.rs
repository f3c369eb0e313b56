//! HTTP handlers, one file per resource

pub mod account;
pub mod health;
pub mod transfer;
pub mod user;

pub use account::{create_account, delete_account, get_account, list_accounts, list_entries};
pub use health::{HealthResponse, health_check};
pub use transfer::{create_transfer, get_transfer};
pub use user::{create_user, login};
