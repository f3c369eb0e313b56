//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::gateway::handlers::HealthResponse;
use crate::gateway::handlers::account::CreateAccountRequest;
use crate::gateway::handlers::transfer::CreateTransferRequest;
use crate::gateway::handlers::user::{
    CreateUserRequest, LoginRequest, LoginResponse, UserResponse,
};
use crate::ledger::models::{Account, Entry, Transfer};
use crate::transfer::TransferResult;

/// JWT bearer authentication security scheme
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token from POST /api/v1/users/login: Authorization: Bearer {access_token}",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bank Ledger API",
        version = "1.0.0",
        description = "Accounts, balancing ledger entries and atomic money transfers.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::user::create_user,
        crate::gateway::handlers::user::login,
        crate::gateway::handlers::account::create_account,
        crate::gateway::handlers::account::list_accounts,
        crate::gateway::handlers::account::get_account,
        crate::gateway::handlers::account::delete_account,
        crate::gateway::handlers::account::list_entries,
        crate::gateway::handlers::transfer::create_transfer,
        crate::gateway::handlers::transfer::get_transfer,
    ),
    components(
        schemas(
            HealthResponse,
            CreateUserRequest,
            UserResponse,
            LoginRequest,
            LoginResponse,
            CreateAccountRequest,
            CreateTransferRequest,
            Account,
            Entry,
            Transfer,
            TransferResult,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "User", description = "Registration and login"),
        (name = "Account", description = "Accounts and their ledger entries (auth required)"),
        (name = "Transfer", description = "Money transfers between accounts (auth required)"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;
