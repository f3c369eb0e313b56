//! Transfer handlers

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
use super::super::types::{ApiError, ApiResult, ValidatedJson, created, ok};
use crate::auth::Claims;
use crate::ledger::currency::Currency;
use crate::ledger::models::Transfer;
use crate::transfer::{TransferParams, TransferResult, check_currency};

/// Transfer request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTransferRequest {
    #[validate(range(min = 1))]
    #[schema(example = 1)]
    pub from_account_id: i64,
    #[validate(range(min = 1))]
    #[schema(example = 2)]
    pub to_account_id: i64,
    /// Smallest currency unit, > 0
    #[validate(range(min = 1))]
    #[schema(example = 3000)]
    pub amount: i64,
    /// Must match the currency of both accounts
    #[validate(custom(function = "validate_currency"))]
    #[schema(example = "BRL")]
    pub currency: String,
}

/// Move money out of one of the caller's accounts
#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    request_body = CreateTransferRequest,
    responses(
        (status = 201, description = "Transfer committed", body = TransferResult),
        (status = 400, description = "Invalid parameters"),
        (status = 401, description = "Caller does not own the source account"),
        (status = 404, description = "Account not found"),
        (status = 422, description = "Account currency differs from the requested one"),
        (status = 500, description = "Transfer aborted and rolled back")
    ),
    security(("bearer_auth" = [])),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(req): ValidatedJson<CreateTransferRequest>,
) -> ApiResult<TransferResult> {
    let currency = Currency::new(&req.currency)?;
    let params = TransferParams {
        from_account_id: req.from_account_id,
        to_account_id: req.to_account_id,
        amount: req.amount,
    };

    // Source ownership before anything about the destination is read
    let from_account = state.store.get_account(params.from_account_id).await?;
    if from_account.owner != claims.sub {
        return ApiError::not_owner("from account doesn't belong to the authenticated user")
            .into_err();
    }
    check_currency(&from_account, currency.as_str())?;
    state
        .orchestrator
        .load_account(params.to_account_id, currency.as_str())
        .await?;

    let result = state.orchestrator.transfer(params).await?;
    created(result)
}

/// A transfer the caller is a party of
#[utoipa::path(
    get,
    path = "/api/v1/transfers/{id}",
    params(("id" = i64, Path, description = "Transfer id")),
    responses(
        (status = 200, description = "Transfer", body = Transfer),
        (status = 401, description = "Caller owns neither account of the transfer"),
        (status = 404, description = "Transfer not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Transfer"
)]
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(transfer_id): Path<i64>,
) -> ApiResult<Transfer> {
    let transfer = state.store.get_transfer(transfer_id).await?;

    for account_id in [transfer.from_account_id, transfer.to_account_id] {
        if state.store.get_account(account_id).await?.owner == claims.sub {
            return ok(transfer);
        }
    }
    ApiError::not_owner("transfer doesn't involve an account of the authenticated user").into_err()
}
