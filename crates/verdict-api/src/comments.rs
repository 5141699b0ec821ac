use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use verdict_db::models::CommentRow;
use verdict_types::api::{CommentResponse, CreateCommentRequest, UpdateCommentRequest};
use verdict_types::models::Actor;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::policy::{self, Action, Resource};
use crate::query::{MAX_LIMIT, PageQuery};
use crate::reviews::validate_text;
use crate::{parse_timestamp, parse_uuid};

pub async fn list(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let review_id = review_id.to_string();
    state
        .db
        .get_review(&title_id.to_string(), &review_id)?
        .ok_or(ApiError::NotFound)?;

    let rows = state
        .db
        .list_comments(&review_id, query.limit.min(MAX_LIMIT), query.offset)?;

    let comments: Vec<CommentResponse> = rows.into_iter().map(comment_response).collect();
    Ok(Json(comments))
}

pub async fn create(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(
        &actor,
        Action::Create,
        Resource::Comment {
            author_id: actor.id,
        },
    )?;
    validate_text(&req.text)?;

    let review_id_str = review_id.to_string();
    state
        .db
        .get_review(&title_id.to_string(), &review_id_str)?
        .ok_or(ApiError::NotFound)?;

    let id = Uuid::new_v4();
    let now = Utc::now();

    state.db.insert_comment(
        &id.to_string(),
        &review_id_str,
        &actor.id.to_string(),
        &req.text,
        now,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id,
            review_id,
            author: actor.username,
            text: req.text,
            created_at: now,
        }),
    ))
}

pub async fn retrieve(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let row = lookup(&state, title_id, review_id, comment_id)?;
    Ok(Json(comment_response(row)))
}

pub async fn update(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = lookup(&state, title_id, review_id, comment_id)?;

    policy::authorize(
        &actor,
        Action::Update,
        Resource::Comment {
            author_id: parse_uuid(&row.author_id, "comment author id"),
        },
    )?;

    if let Some(text) = &req.text {
        validate_text(text)?;
    }

    let updated = state.db.update_comment(
        &review_id.to_string(),
        &comment_id.to_string(),
        req.text.as_deref(),
    )?;

    Ok(Json(comment_response(updated)))
}

pub async fn destroy(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    let row = lookup(&state, title_id, review_id, comment_id)?;

    policy::authorize(
        &actor,
        Action::Delete,
        Resource::Comment {
            author_id: parse_uuid(&row.author_id, "comment author id"),
        },
    )?;

    state
        .db
        .delete_comment(&review_id.to_string(), &comment_id.to_string())?;
    Ok(StatusCode::NO_CONTENT)
}

/// A comment is only addressable through its own review/title chain.
fn lookup(
    state: &AppState,
    title_id: Uuid,
    review_id: Uuid,
    comment_id: Uuid,
) -> Result<CommentRow, ApiError> {
    let review_id = review_id.to_string();
    state
        .db
        .get_review(&title_id.to_string(), &review_id)?
        .ok_or(ApiError::NotFound)?;

    state
        .db
        .get_comment(&review_id, &comment_id.to_string())?
        .ok_or(ApiError::NotFound)
}

fn comment_response(row: CommentRow) -> CommentResponse {
    CommentResponse {
        id: parse_uuid(&row.id, "comment id"),
        review_id: parse_uuid(&row.review_id, "comment review id"),
        author: row.author_username,
        text: row.text,
        created_at: parse_timestamp(&row.created_at, "comment"),
    }
}
