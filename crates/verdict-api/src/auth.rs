use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::{Rng, distr::Alphanumeric};
use uuid::Uuid;

use verdict_db::{Database, StoreError};
use verdict_types::api::{Claims, SignupRequest, SignupResponse, TokenRequest, TokenResponse};

use crate::error::ApiError;
use crate::mailer::{Mailer, OutboundEmail};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub mailer: Arc<dyn Mailer>,
}

/// `/users/me` is the self-service path, so no account may claim the name.
pub(crate) const RESERVED_USERNAME: &str = "me";

const CODE_LEN: usize = 24;

/// Create-or-refresh registration. Idempotent for an identical
/// (username, email) pair; every call regenerates the confirmation code
/// and dispatches exactly one message.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username)?;
    validate_email(&req.email)?;

    let code = generate_confirmation_code();
    let user_id = Uuid::new_v4();

    state
        .db
        .upsert_signup(&user_id.to_string(), &req.username, &req.email, &code)
        .map_err(signup_conflict)?;

    state.mailer.send(OutboundEmail {
        to: req.email.clone(),
        subject: "Your confirmation code".into(),
        body: format!(
            "Hello, {}.\nYour confirmation code: {}",
            req.username, code
        ),
    });

    Ok(Json(SignupResponse {
        username: req.username,
        email: req.email,
    }))
}

/// Exchange a confirmation code for an access token. Unknown username is
/// 404; a wrong code is a field-keyed validation error with a constant
/// message. Issuance is repeatable, the code is not invalidated.
pub async fn token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_username(&req.username)?
        .ok_or(ApiError::NotFound)?;

    if user.confirmation_code.as_deref() != Some(req.confirmation_code.as_str()) {
        return Err(ApiError::validation("confirmation_code", "incorrect code"));
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {}", user.id, e)))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// Sign-up conflicts are validation errors on the identity fields, not 409s.
fn signup_conflict(err: StoreError) -> ApiError {
    match err {
        StoreError::Conflict { field } => ApiError::Validation {
            field,
            message: format!("{} already registered to another account", field),
        },
        other => other.into(),
    }
}

pub(crate) fn validate_username(username: &str) -> Result<(), ApiError> {
    if username == RESERVED_USERNAME {
        return Err(ApiError::validation("username", "\"me\" is a reserved name"));
    }
    if username.is_empty() || username.len() > 150 {
        return Err(ApiError::validation("username", "must be 1-150 characters"));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.is_empty() || email.len() > 254 || !email.contains('@') {
        return Err(ApiError::validation("email", "invalid email address"));
    }
    Ok(())
}

fn generate_confirmation_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LEN)
        .map(char::from)
        .collect()
}

pub(crate) fn create_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(token)
}
