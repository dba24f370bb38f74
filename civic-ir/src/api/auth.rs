//! Bearer token authentication for civic-ir
//!
//! The middleware resolves `Authorization: Bearer <token>` into a `Caller`
//! stored in request extensions. A request without the header passes through
//! anonymously and the access policy decides; a present but invalid token is
//! rejected with 401 here.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
    Extension,
};
use civic_common::api::{bearer_token, verify_token, ApiAuthError};
use civic_common::Caller;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

/// Caller resolved by [`auth_middleware`], `None` when anonymous
pub type Identity = Option<Extension<Caller>>;

/// Borrow the caller out of an [`Identity`] extractor
pub fn caller_of(identity: &Identity) -> Option<&Caller> {
    identity.as_ref().map(|Extension(caller)| caller)
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(header) = request.headers().get(AUTHORIZATION) else {
        return Ok(next.run(request).await);
    };

    let header = header
        .to_str()
        .map_err(|_| ApiError::Unauthenticated("Authorization header is not ASCII".to_string()))?;

    let token = bearer_token(header)
        .ok_or_else(|| ApiError::Unauthenticated("Expected a Bearer token".to_string()))?;

    let now = chrono::Utc::now().timestamp();
    let claims = verify_token(token, state.shared_secret, now).map_err(|e| {
        match &e {
            ApiAuthError::InvalidSignature => warn!("Rejected token with invalid signature"),
            other => debug!("Rejected token: {}", other),
        }
        ApiError::Unauthenticated(e.to_string())
    })?;

    request.extensions_mut().insert(claims.caller());

    Ok(next.run(request).await)
}
