//! Row types and parameter structs for the ledger tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A balance-holding account owned by one user, in one currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Account {
    #[schema(example = 1)]
    pub id: i64,
    #[schema(example = "alice")]
    pub owner: String,
    /// Smallest currency unit (cents)
    #[schema(example = 10000)]
    pub balance: i64,
    #[schema(example = "BRL")]
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// One signed balance movement against one account (negative = debit)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    #[schema(example = -3000)]
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Record of a money movement between two accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    /// Always positive
    #[schema(example = 3000)]
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Sentinel stored in `password_changed_at` until the first password change
pub fn never_changed() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct ListAccountsParams {
    pub owner: String,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct ListEntriesParams {
    pub account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Transfers where either side is one of the given accounts
#[derive(Debug, Clone, Copy)]
pub struct ListTransfersParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_password_hash_not_serialized() {
        let user = User {
            username: "alice".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            email: "alice@example.com".to_string(),
            password_changed_at: never_changed(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("alice@example.com"));
    }

    #[test]
    fn test_account_json_shape() {
        let account = Account {
            id: 7,
            owner: "bob".to_string(),
            balance: 100,
            currency: "BRL".to_string(),
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(value["balance"], 100);
        assert_eq!(value["currency"], "BRL");
    }
}
