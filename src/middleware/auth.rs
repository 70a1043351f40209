use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;

use crate::app::AppState;
use crate::auth::validate_jwt;
use crate::context::{ForwardedAuth, RequestContext};
use crate::error::ApiError;

/// Builds the RequestContext for every portal request.
///
/// The bearer token is forwarded to the backends as-is. When a JWT secret is
/// configured the token must verify, and its user name becomes the actor;
/// otherwise the token is forwarded unverified under the actor "portal". A
/// missing token is rejected only when auth is required.
pub async fn forward_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let security = &state.security;

    let auth = match extract_bearer_token(&headers) {
        Ok(Some(token)) => {
            let actor = if security.jwt_secret.is_empty() {
                "portal".to_string()
            } else {
                validate_jwt(&token, &security.jwt_secret)
                    .map_err(|e| ApiError::unauthorized(e.to_string()).into_response())?
                    .actor()
                    .to_string()
            };
            Some(ForwardedAuth { token, actor })
        }
        Ok(None) if security.require_auth => {
            return Err(ApiError::unauthorized("Missing Authorization header").into_response());
        }
        Ok(None) => None,
        Err(msg) => return Err(ApiError::unauthorized(msg).into_response()),
    };

    let timeout = (state.request_timeout_ms > 0).then(|| Duration::from_millis(state.request_timeout_ms));
    let ctx = RequestContext::new(auth, timeout);
    tracing::debug!("Request {} for {}", ctx.request_id, ctx.actor());
    request.extensions_mut().insert(ctx);

    Ok(next.run(request).await)
}

/// Extract the bearer token; `Ok(None)` when no Authorization header is sent
fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<String>, String> {
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if token.trim().is_empty() => Err("Empty JWT token".to_string()),
        Some(token) => Ok(Some(token.trim().to_string())),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}
