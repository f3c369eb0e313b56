use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use thiserror::Error;

use super::token::{Claims, TokenError, TokenMaker};
use crate::gateway::{
    state::AppState,
    types::{ApiResponse, error_codes},
};

pub const AUTHORIZATION_TYPE_BEARER: &str = "bearer";

/// Why a request was refused by [`jwt_auth_middleware`]
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthRejection {
    #[error("authorization header was not provided")]
    MissingHeader,

    #[error("invalid authorization header format")]
    InvalidFormat,

    #[error("invalid authorization type: {0}")]
    UnsupportedType(String),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl AuthRejection {
    pub fn code(&self) -> i32 {
        match self {
            AuthRejection::MissingHeader => error_codes::MISSING_AUTH,
            _ => error_codes::AUTH_FAILED,
        }
    }
}

/// Verify the `Authorization: Bearer <token>` header
pub fn authorize(headers: &HeaderMap, token_maker: &TokenMaker) -> Result<Claims, AuthRejection> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthRejection::MissingHeader)?
        .to_str()
        .map_err(|_| AuthRejection::InvalidFormat)?;

    let fields: Vec<&str> = auth_header.split_whitespace().collect();
    let [auth_type, token] = fields.as_slice() else {
        return Err(AuthRejection::InvalidFormat);
    };

    let auth_type = auth_type.to_lowercase();
    if auth_type != AUTHORIZATION_TYPE_BEARER {
        return Err(AuthRejection::UnsupportedType(auth_type));
    }

    Ok(token_maker.verify_token(token)?)
}

pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<()>>)> {
    match authorize(request.headers(), &state.token_maker) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            Ok(next.run(request).await)
        }
        Err(rejection) => {
            tracing::debug!(reason = %rejection, "Request rejected by auth middleware");
            Err((
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::<()>::error(
                    rejection.code(),
                    rejection.to_string(),
                )),
            ))
        }
    }
}
