//! Bearer token signing and verification
//!
//! # Token format
//!
//! `<claims>.<signature>` where:
//! - `claims` is URL-safe base64 (no padding) of the JSON `{"sub","role","exp"}`
//! - `signature` is the SHA-256 of `claims` followed by the shared secret as a
//!   decimal i64 string, as 64 lowercase hex characters
//!
//! Tokens are minted by the credential issuer, which shares the secret stored
//! in the `settings` table under `api_shared_secret`. This module only ever
//! turns a token into a resolved [`Caller`](crate::Caller).
//!
//! # Pure Functions
//!
//! Apart from secret loading, everything here is a pure function with no
//! HTTP framework dependency. The axum extractor lives in the service crate.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::{Caller, Role};

#[cfg(feature = "sqlx")]
use sqlx::SqlitePool;

/// Settings key holding the token secret
pub const SHARED_SECRET_KEY: &str = "api_shared_secret";

// ========================================
// Error Types
// ========================================

/// Token validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ApiAuthError {
    /// Token is not `<claims>.<signature>` or claims do not decode
    Malformed(String),

    /// Signature does not match the claims
    InvalidSignature,

    /// Token lifetime has passed
    Expired { exp: i64, now: i64 },

    /// Database error loading shared secret
    DatabaseError(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::Malformed(reason) => write!(f, "Malformed token: {}", reason),
            ApiAuthError::InvalidSignature => write!(f, "Invalid token signature"),
            ApiAuthError::Expired { exp, now } => {
                write!(f, "Token expired at {} (now {})", exp, now)
            }
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Claims
// ========================================

/// Identity claims carried in a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Opaque user identifier
    pub sub: String,
    /// Caller role
    pub role: Role,
    /// Expiry as Unix epoch seconds
    pub exp: i64,
}

impl TokenClaims {
    pub fn new(sub: impl Into<String>, role: Role, exp: i64) -> Self {
        Self {
            sub: sub.into(),
            role,
            exp,
        }
    }

    /// Resolved caller identity
    pub fn caller(&self) -> Caller {
        Caller::new(self.sub.clone(), self.role)
    }
}

// ========================================
// Shared Secret Management
// ========================================

/// Load the token secret from database settings, generating one if absent
#[cfg(feature = "sqlx")]
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    let value = crate::db::get_setting(db, SHARED_SECRET_KEY)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    match value {
        Some(value) => value
            .parse::<i64>()
            .map_err(|e| ApiAuthError::DatabaseError(format!("Invalid i64: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate and store a random non-zero secret
#[cfg(feature = "sqlx")]
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, ApiAuthError> {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let secret: i64 = loop {
        let val = rng.gen::<i64>();
        if val != 0 {
            break val;
        }
    };

    crate::db::set_setting(db, SHARED_SECRET_KEY, &secret.to_string())
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    tracing::info!("Generated new API token secret");

    Ok(secret)
}

// ========================================
// Signing and Verification
// ========================================

/// Calculate the signature of an encoded claims segment
pub fn calculate_signature(claims_segment: &str, shared_secret: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(claims_segment.as_bytes());
    hasher.update(shared_secret.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Sign claims into a bearer token
///
/// # Examples
///
/// ```
/// use civic_common::api::auth::{sign_token, verify_token, TokenClaims};
/// use civic_common::Role;
///
/// let claims = TokenClaims::new("user-7", Role::Citizen, 2_000_000_000);
/// let token = sign_token(&claims, 42);
///
/// let verified = verify_token(&token, 42, 1_700_000_000).unwrap();
/// assert_eq!(verified, claims);
/// ```
pub fn sign_token(claims: &TokenClaims, shared_secret: i64) -> String {
    // TokenClaims always serializes
    let json = serde_json::to_vec(claims).unwrap_or_default();
    let segment = URL_SAFE_NO_PAD.encode(json);
    let signature = calculate_signature(&segment, shared_secret);
    format!("{}.{}", segment, signature)
}

/// Verify a bearer token and return its claims
///
/// `now` is Unix epoch seconds. A token is valid up to and including `exp`.
pub fn verify_token(token: &str, shared_secret: i64, now: i64) -> Result<TokenClaims, ApiAuthError> {
    let (segment, signature) = token
        .trim()
        .split_once('.')
        .ok_or_else(|| ApiAuthError::Malformed("missing signature segment".to_string()))?;

    if segment.is_empty() || signature.len() != 64 {
        return Err(ApiAuthError::Malformed("unexpected segment length".to_string()));
    }

    if calculate_signature(segment, shared_secret) != signature {
        return Err(ApiAuthError::InvalidSignature);
    }

    let json = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| ApiAuthError::Malformed(format!("claims not base64: {}", e)))?;

    let claims: TokenClaims = serde_json::from_slice(&json)
        .map_err(|e| ApiAuthError::Malformed(format!("claims not valid JSON: {}", e)))?;

    if claims.sub.trim().is_empty() {
        return Err(ApiAuthError::Malformed("empty subject".to_string()));
    }

    if now > claims.exp {
        return Err(ApiAuthError::Expired {
            exp: claims.exp,
            now,
        });
    }

    Ok(claims)
}

/// Extract the token from an `Authorization` header value
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

// ========================================
// Tests
// ========================================
