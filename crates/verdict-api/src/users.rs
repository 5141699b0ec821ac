use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;
use uuid::Uuid;

use verdict_db::UserPatch;
use verdict_db::models::UserRow;
use verdict_types::api::{CreateUserRequest, UpdateUserRequest, UserResponse};
use verdict_types::models::{Actor, Role};

use crate::auth::{AppState, validate_email, validate_username};
use crate::error::ApiError;
use crate::policy::{self, Action, Resource};
use crate::query::{MAX_LIMIT, SearchQuery};

// -- Admin management surface --

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(&actor, Action::Read, Resource::UserAccount)?;

    let rows = state.db.list_users(
        query.search.as_deref(),
        query.limit.min(MAX_LIMIT),
        query.offset,
    )?;

    let users: Vec<UserResponse> = rows.into_iter().map(user_response).collect();
    Ok(Json(users))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(&actor, Action::Create, Resource::UserAccount)?;
    validate_username(&req.username)?;
    validate_email(&req.email)?;

    let role = req.role.unwrap_or_default();
    let id = Uuid::new_v4();

    state.db.create_user(
        &id.to_string(),
        &req.username,
        &req.email,
        role,
        req.first_name.as_deref(),
        req.last_name.as_deref(),
        req.bio.as_deref(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            username: req.username,
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            bio: req.bio,
            role,
        }),
    ))
}

pub async fn retrieve(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(&actor, Action::Read, Resource::UserAccount)?;

    let row = state
        .db
        .get_user_by_username(&username)?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(user_response(row)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(&actor, Action::Update, Resource::UserAccount)?;
    if let Some(email) = &req.email {
        validate_email(email)?;
    }

    let patch = UserPatch {
        email: req.email,
        role: req.role,
        first_name: req.first_name,
        last_name: req.last_name,
        bio: req.bio,
    };

    let updated = state.db.update_user(&username, &patch)?;
    Ok(Json(user_response(updated)))
}

pub async fn destroy(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(&actor, Action::Delete, Resource::UserAccount)?;
    state.db.delete_user(&username)?;
    Ok(StatusCode::NO_CONTENT)
}

// -- Self-service surface --

pub async fn me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_user_by_username(&actor.username)?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(user_response(row)))
}

/// Partial self-update. A submitted `role` is silently discarded: the
/// caller keeps their current role no matter what the payload says.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(email) = &req.email {
        validate_email(email)?;
    }

    let patch = UserPatch {
        email: req.email,
        role: None,
        first_name: req.first_name,
        last_name: req.last_name,
        bio: req.bio,
    };

    let updated = state.db.update_user(&actor.username, &patch)?;
    Ok(Json(user_response(updated)))
}

fn user_response(row: UserRow) -> UserResponse {
    let role = Role::from_str(&row.role).unwrap_or_else(|| {
        warn!("Unknown role '{}' on user '{}'", row.role, row.username);
        Role::User
    });

    UserResponse {
        username: row.username,
        email: row.email,
        first_name: row.first_name,
        last_name: row.last_name,
        bio: row.bio,
        role,
    }
}
