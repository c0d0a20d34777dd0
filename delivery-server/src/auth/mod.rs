//! Authentication
//!
//! - [`JwtService`] - bearer token verification
//! - [`CurrentUser`] - authenticated caller, an axum extractor
//! - [`require_role`] - role guard used by handlers

pub mod extractor;
pub mod jwt;

pub use extractor::require_role;
pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
