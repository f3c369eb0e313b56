//! User registration and login

use std::sync::Arc;

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::super::state::AppState;
use super::super::types::request::validate_alphanumeric;
use super::super::types::{ApiResult, ValidatedJson, created, ok};
use crate::auth::{hash_password, verify_password};
use crate::ledger::models::{CreateUserParams, User};

/// User registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(custom(function = "validate_alphanumeric"))]
    #[schema(example = "alice")]
    pub username: String,
    #[validate(length(min = 8))]
    #[schema(example = "password123")]
    pub password: String,
    #[validate(length(min = 1))]
    #[schema(example = "Alice")]
    pub name: String,
    #[validate(length(min = 1))]
    #[schema(example = "Liddell")]
    pub last_name: String,
    #[validate(email)]
    #[schema(example = "alice@example.com")]
    pub email: String,
}

/// Public view of a user (no password hash)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub username: String,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            name: user.name,
            last_name: user.last_name,
            email: user.email,
            password_changed_at: user.password_changed_at,
            created_at: user.created_at,
        }
    }
}

/// User login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(custom(function = "validate_alphanumeric"))]
    #[schema(example = "alice")]
    pub username: String,
    #[validate(length(min = 8))]
    #[schema(example = "password123")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid parameters"),
        (status = 409, description = "Username or email already taken")
    ),
    tag = "User"
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> ApiResult<UserResponse> {
    let password_hash = hash_password(&req.password)?;

    let user = state
        .store
        .create_user(CreateUserParams {
            username: req.username,
            password_hash,
            name: req.name,
            last_name: req.last_name,
            email: req.email,
        })
        .await?;

    tracing::info!(username = %user.username, "User registered");
    created(user.into())
}

/// Log in and obtain an access token
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Invalid parameters"),
        (status = 401, description = "Wrong password"),
        (status = 404, description = "Unknown user")
    ),
    tag = "User"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let user = state.store.get_user(&req.username).await?;

    verify_password(&req.password, &user.password_hash)?;

    let (access_token, claims) = state
        .token_maker
        .create_token(&user.username, state.token_duration)?;
    let access_token_expires_at =
        DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now);

    tracing::info!(username = %user.username, "User logged in");
    ok(LoginResponse {
        access_token,
        access_token_expires_at,
        user: user.into(),
    })
}
