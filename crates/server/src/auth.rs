use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use shared::error::{ApiError, ErrorCode};
use storage::StoredUser;

use crate::{reject, AppState, Rejection};

/// Authenticated user attached to the request by the `authenticate` layer.
#[derive(Clone)]
pub struct AuthUser(pub Arc<StoredUser>);

/// First admin gate: verifies the bearer token and loads the session user.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Rejection> {
    let Some(token) = bearer_token(&request) else {
        return Err(reject(ApiError::new(
            ErrorCode::Unauthorized,
            "missing bearer token",
        )));
    };

    let user = server_api::authenticate(&state.api, &token)
        .await
        .map_err(reject)?;
    request.extensions_mut().insert(AuthUser(Arc::new(user)));
    Ok(next.run(request).await)
}

/// Second admin gate: rejects any session whose user is not an admin.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, Rejection> {
    let Some(AuthUser(user)) = request.extensions().get::<AuthUser>().cloned() else {
        return Err(reject(ApiError::new(
            ErrorCode::Unauthorized,
            "missing bearer token",
        )));
    };
    server_api::ensure_admin(&user).map_err(reject)?;
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<String> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}
