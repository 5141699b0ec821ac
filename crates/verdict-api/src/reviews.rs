use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use verdict_db::models::ReviewRow;
use verdict_types::api::{CreateReviewRequest, ReviewResponse, UpdateReviewRequest};
use verdict_types::models::Actor;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::policy::{self, Action, Resource};
use crate::query::{MAX_LIMIT, PageQuery};
use crate::{parse_timestamp, parse_uuid};

pub async fn list(
    State(state): State<AppState>,
    Path(title_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let title_id = title_id.to_string();
    state.db.get_title(&title_id)?.ok_or(ApiError::NotFound)?;

    let rows = state
        .db
        .list_reviews(&title_id, query.limit.min(MAX_LIMIT), query.offset)?;

    let reviews: Vec<ReviewResponse> = rows.into_iter().map(review_response).collect();
    Ok(Json(reviews))
}

pub async fn create(
    State(state): State<AppState>,
    Path(title_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(
        &actor,
        Action::Create,
        Resource::Review {
            author_id: actor.id,
        },
    )?;
    validate_text(&req.text)?;
    validate_score(req.score)?;

    let title_id_str = title_id.to_string();
    state
        .db
        .get_title(&title_id_str)?
        .ok_or(ApiError::NotFound)?;

    let id = Uuid::new_v4();
    let now = Utc::now();

    // A second review by the same author is rejected by the storage layer's
    // uniqueness constraint, not by a pre-check.
    state.db.insert_review(
        &id.to_string(),
        &title_id_str,
        &actor.id.to_string(),
        &req.text,
        req.score,
        now,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(ReviewResponse {
            id,
            title_id,
            author: actor.username,
            text: req.text,
            score: req.score,
            created_at: now,
        }),
    ))
}

pub async fn retrieve(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_review(&title_id.to_string(), &review_id.to_string())?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(review_response(row)))
}

pub async fn update(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title_id = title_id.to_string();
    let review_id = review_id.to_string();

    let row = state
        .db
        .get_review(&title_id, &review_id)?
        .ok_or(ApiError::NotFound)?;

    policy::authorize(
        &actor,
        Action::Update,
        Resource::Review {
            author_id: parse_uuid(&row.author_id, "review author id"),
        },
    )?;

    if let Some(text) = &req.text {
        validate_text(text)?;
    }
    if let Some(score) = req.score {
        validate_score(score)?;
    }

    let updated = state
        .db
        .update_review(&title_id, &review_id, req.text.as_deref(), req.score)?;

    Ok(Json(review_response(updated)))
}

pub async fn destroy(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    let title_id = title_id.to_string();
    let review_id = review_id.to_string();

    let row = state
        .db
        .get_review(&title_id, &review_id)?
        .ok_or(ApiError::NotFound)?;

    policy::authorize(
        &actor,
        Action::Delete,
        Resource::Review {
            author_id: parse_uuid(&row.author_id, "review author id"),
        },
    )?;

    state.db.delete_review(&title_id, &review_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn validate_text(text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::validation("text", "must not be empty"));
    }
    Ok(())
}

pub(crate) fn validate_score(score: i32) -> Result<(), ApiError> {
    if !(1..=10).contains(&score) {
        return Err(ApiError::validation("score", "must be between 1 and 10"));
    }
    Ok(())
}

fn review_response(row: ReviewRow) -> ReviewResponse {
    ReviewResponse {
        id: parse_uuid(&row.id, "review id"),
        title_id: parse_uuid(&row.title_id, "review title id"),
        author: row.author_username,
        text: row.text,
        score: row.score,
        created_at: parse_timestamp(&row.created_at, "review"),
    }
}
