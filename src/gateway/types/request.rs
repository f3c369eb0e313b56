//! Request extraction and field validation
//!
//! [`ValidatedJson`] and [`ValidatedQuery`] run `validator` rules at the
//! extractor level, so handlers never see a request that failed them.

use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::{Deserialize, de::DeserializeOwned};
use utoipa::IntoParams;
use validator::{Validate, ValidationError};

use super::response::ApiError;
use crate::ledger::currency;

/// Default page size of list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 40;
pub const MAX_PAGE_SIZE: i64 = 200;
/// Keeps `(page - 1) * MAX_PAGE_SIZE` far inside `i64`
pub const MAX_PAGE: i64 = 1_000_000;

/// JSON body that passed its `validator` rules
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e.body_text())))?;

        value
            .validate()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(ValidatedJson(value))
    }
}

/// Query string that passed its `validator` rules
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid query: {}", e.body_text())))?;

        value
            .validate()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(ValidatedQuery(value))
    }
}

/// `?page=&quantity=` pagination
#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number
    #[validate(range(min = 1, max = 1_000_000))]
    #[param(minimum = 1, maximum = 1_000_000, example = 1)]
    pub page: i64,
    /// Page size, 40 when omitted or zero
    #[serde(default)]
    #[validate(range(min = 0, max = 200))]
    #[param(maximum = 200, example = 40)]
    pub quantity: i64,
}

impl PageQuery {
    pub fn limit(&self) -> i64 {
        if self.quantity == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.quantity
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.limit())
    }
}

pub fn validate_alphanumeric(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new("alphanum"));
    }
    Ok(())
}

pub fn validate_currency(value: &str) -> Result<(), ValidationError> {
    if !currency::is_supported(value) {
        return Err(ValidationError::new("currency"));
    }
    Ok(())
}
