//! Caller authentication.
//!
//! - **Tokens**: HS256 bearer tokens carrying `{id, role, tenantId}`
//! - **Passwords**: a pluggable hashing scheme (Argon2id by default)

pub mod password;
pub mod token;

pub use password::{Argon2Hasher, PasswordHasher};
pub use token::{extract_bearer, AuthTokenService, TokenClaims};
