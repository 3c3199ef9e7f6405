//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::web::state::AppState;

/// Middleware that validates the bearer access token and resolves its user.
///
/// If valid, inserts the `User` into request extensions for handlers to use.
/// Any failure yields the same 401, and refresh tokens are never accepted here.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the bearer token
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let token = bearer_token(header_value).ok_or(ApiError::Unauthorized)?;

    // 2. Verify signature and expiry
    let claims = state.tokens.verify(token).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        ApiError::Unauthorized
    })?;
    if claims.is_refresh() {
        debug!("Refresh token presented as an access token");
        return Err(ApiError::Unauthorized);
    }

    // 3. Resolve the subject to a user
    let user = state.db.get_user_by_phone(&claims.sub).await.map_err(|e| {
        debug!("Token subject did not resolve to a user: {}", e);
        ApiError::Unauthorized
    })?;

    // 4. Insert the user into request extensions
    req.extensions_mut().insert(user);

    // 5. Continue to the handler
    Ok(next.run(req).await)
}
