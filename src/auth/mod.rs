//! Credentials and access tokens
//!
//! - [`password`] - argon2 password hashing
//! - [`token`] - HS256 JWT access tokens
//! - [`middleware`] - Bearer token check for protected routes

pub mod middleware;
pub mod password;
pub mod token;

pub use middleware::jwt_auth_middleware;
pub use password::{PasswordError, hash_password, verify_password};
pub use token::{Claims, TokenError, TokenMaker};
