use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::warn;

use verdict_types::api::Claims;
use verdict_types::models::{Actor, Role};

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate the bearer token, then resolve the current user
/// record so role changes take effect on the next request. The resulting
/// [`Actor`] is attached as a request extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthenticated)?;

    // A token for a deleted user is no longer valid.
    let user = state
        .db
        .get_user_by_id(&token_data.claims.sub.to_string())?
        .ok_or(ApiError::Unauthenticated)?;

    let role = Role::from_str(&user.role).unwrap_or_else(|| {
        warn!("Unknown role '{}' on user '{}'", user.role, user.username);
        Role::User
    });

    let actor = Actor {
        id: token_data.claims.sub,
        username: user.username,
        role,
    };
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}
