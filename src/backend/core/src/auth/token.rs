//! Signed bearer tokens carrying the caller's identity.
//!
//! Payload: `{ user: { id, role, tenantId }, iat, exp }`, HS256-signed with
//! the process-wide secret. Tokens expire after the configured TTL; expiry is
//! checked with a small leeway for clock skew.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::config::AuthSettings;
use crate::context::Identity;
use crate::error::{Result, TrackError};

// ═══════════════════════════════════════════════════════════════════════════════
// Claims
// ═══════════════════════════════════════════════════════════════════════════════

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// The identity the token was issued to
    pub user: Identity,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Token Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Issues and verifies bearer tokens.
pub struct AuthTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_ttl: Duration,
}

impl fmt::Debug for AuthTokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokenService")
            .field("token_ttl", &self.token_ttl)
            .field("leeway", &self.validation.leeway)
            .finish_non_exhaustive()
    }
}

impl AuthTokenService {
    pub fn new(secret: &str, token_ttl: Duration, leeway: Duration) -> Result<Self> {
        if secret.is_empty() {
            return Err(TrackError::configuration("token secret must not be empty"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway.as_secs();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            token_ttl,
        })
    }

    pub fn from_settings(settings: &AuthSettings) -> Result<Self> {
        Self::new(&settings.jwt_secret, settings.token_ttl, settings.leeway)
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Sign a token for `identity`.
    pub fn issue(&self, identity: &Identity) -> Result<String> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.token_ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            user: identity.clone(),
            iat: now,
            exp: now.saturating_add(ttl),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            TrackError::internal(format!("Failed to sign token: {}", e))
        })
    }

    /// Recover the identity from a token.
    ///
    /// Malformed, tampered, wrongly signed and expired tokens all yield the
    /// same Unauthorized error; the reason is only logged.
    pub fn verify(&self, token: &str) -> Result<Identity> {
        match decode::<TokenClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => {
                counter!("auth_verifications_total", "outcome" => "ok").increment(1);
                Ok(data.claims.user)
            }
            Err(e) => {
                debug!(reason = ?e.kind(), "Token verification failed");
                counter!("auth_verifications_total", "outcome" => "rejected").increment(1);
                Err(TrackError::unauthorized())
            }
        }
    }

    /// Verify the bearer token carried in `headers`.
    pub fn verify_headers(&self, headers: &HeaderMap) -> Result<Identity> {
        let token = extract_bearer(headers).ok_or_else(TrackError::unauthorized)?;
        self.verify(token)
    }
}

/// The token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or_else(|| s.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
