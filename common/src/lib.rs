//! Shared building blocks for the APDU bridge workspace.
//!
//! Everything here is dependency-light and used by every other crate:
//!
//! - [`ErrorLocation`] - file/line/column attached to every error variant
//! - [`HttpStatusCode`] - status categorization for the HTTP transport
//! - [`RedactedToken`] - auth token that never leaks through logs

pub mod error;
pub mod http_status;
pub mod redacted_token;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_token::RedactedToken;
