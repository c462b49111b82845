//! Runner Common - Shared utilities for the match runner
//!
//! This crate provides the functionality shared by the runner binary and
//! its HTTP layer:
//!
//! - **Initialization**: [`init_tracing`] for standardized logging setup
//! - **Errors**: [`ErrorResponse`] and helpers producing JSON error bodies
//!   for axum handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use runner_common::{bad_request, ApiResult};
//!
//! async fn handler() -> ApiResult<MyBody> {
//!     Err(bad_request("match_id is required"))
//! }
//! ```

pub mod error;
pub mod init;

// Re-export commonly used items at crate root
pub use error::{bad_request, forbidden, internal_error, ApiError, ApiResult, ErrorResponse};
pub use init::init_tracing;
