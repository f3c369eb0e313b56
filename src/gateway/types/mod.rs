//! Gateway types module
//!
//! ## Submodules
//! - [`request`]: validating extractors, pagination and field validators
//! - [`response`]: response envelope, handler errors and error codes

pub mod request;
pub mod response;

// Re-export commonly used types at module root
pub use request::{PageQuery, ValidatedJson, ValidatedQuery};
pub use response::{ApiError, ApiResponse, ApiResult, created, error_codes, ok};
