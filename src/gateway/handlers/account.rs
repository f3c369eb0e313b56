//! Account handlers
//!
//! Every route here runs behind `jwt_auth_middleware`; the caller is the
//! `sub` of the verified [`Claims`].

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use super::super::state::AppState;
use super::super::types::request::validate_currency;
use super::super::types::{
    ApiError, ApiResult, PageQuery, ValidatedJson, ValidatedQuery, created, ok,
};
use crate::auth::Claims;
use crate::ledger::currency::Currency;
use crate::ledger::models::{
    Account, CreateAccountParams, Entry, ListAccountsParams, ListEntriesParams,
};

/// Open account request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAccountRequest {
    #[validate(custom(function = "validate_currency"))]
    #[schema(example = "BRL")]
    pub currency: String,
}

/// Load an account and check the caller owns it
pub(crate) async fn load_owned_account(
    state: &AppState,
    claims: &Claims,
    account_id: i64,
) -> Result<Account, ApiError> {
    if account_id < 1 {
        return ApiError::bad_request(format!("Invalid account id: {}", account_id)).into_err();
    }

    let account = state.store.get_account(account_id).await?;
    if account.owner != claims.sub {
        return ApiError::not_owner("account doesn't belong to the authenticated user").into_err();
    }
    Ok(account)
}

/// Open a new account for the caller with a zero balance
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = Account),
        (status = 400, description = "Unsupported currency"),
        (status = 401, description = "Authentication failed"),
        (status = 409, description = "Caller already has an account in this currency")
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(req): ValidatedJson<CreateAccountRequest>,
) -> ApiResult<Account> {
    let currency = Currency::new(&req.currency)?;

    let account = state
        .store
        .create_account(CreateAccountParams {
            owner: claims.sub,
            balance: 0,
            currency: currency.to_string(),
        })
        .await?;

    tracing::info!(
        account_id = account.id,
        owner = %account.owner,
        currency = %account.currency,
        "Account opened"
    );
    created(account)
}

/// List the caller's accounts
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    params(PageQuery),
    responses(
        (status = 200, description = "Accounts of the caller", body = Vec<Account>),
        (status = 400, description = "Invalid pagination"),
        (status = 401, description = "Authentication failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
) -> ApiResult<Vec<Account>> {
    let accounts = state
        .store
        .list_accounts(ListAccountsParams {
            owner: claims.sub,
            limit: page.limit(),
            offset: page.offset(),
        })
        .await?;

    ok(accounts)
}

#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}",
    params(("id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account", body = Account),
        (status = 401, description = "Not the owner of the account"),
        (status = 404, description = "Account not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(account_id): Path<i64>,
) -> ApiResult<Account> {
    ok(load_owned_account(&state, &claims, account_id).await?)
}

/// Delete an account that has no entries or transfers
#[utoipa::path(
    delete,
    path = "/api/v1/accounts/{id}",
    params(("id" = i64, Path, description = "Account id")),
    responses(
        (status = 200, description = "Deleted account", body = Account),
        (status = 401, description = "Not the owner of the account"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Account has ledger history")
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(account_id): Path<i64>,
) -> ApiResult<Account> {
    let account = load_owned_account(&state, &claims, account_id).await?;
    state.store.delete_account(account.id).await?;

    tracing::info!(account_id = account.id, owner = %account.owner, "Account deleted");
    ok(account)
}

/// Ledger entries of one of the caller's accounts, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{id}/entries",
    params(("id" = i64, Path, description = "Account id"), PageQuery),
    responses(
        (status = 200, description = "Entries", body = Vec<Entry>),
        (status = 401, description = "Not the owner of the account"),
        (status = 404, description = "Account not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Account"
)]
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(account_id): Path<i64>,
    ValidatedQuery(page): ValidatedQuery<PageQuery>,
) -> ApiResult<Vec<Entry>> {
    let account = load_owned_account(&state, &claims, account_id).await?;

    let entries = state
        .store
        .list_entries(ListEntriesParams {
            account_id: account.id,
            limit: page.limit(),
            offset: page.offset(),
        })
        .await?;

    ok(entries)
}
