use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use verdict_types::api::{CreateGenreRequest, GenreResponse};
use verdict_types::models::Actor;

use crate::auth::AppState;
use crate::categories::{validate_name, validate_slug};
use crate::error::ApiError;
use crate::policy::{self, Action, Resource};
use crate::query::{MAX_LIMIT, SearchQuery};

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.list_genres(
        query.search.as_deref(),
        query.limit.min(MAX_LIMIT),
        query.offset,
    )?;

    let genres: Vec<GenreResponse> = rows
        .into_iter()
        .map(|row| GenreResponse {
            name: row.name,
            slug: row.slug,
        })
        .collect();

    Ok(Json(genres))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateGenreRequest>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(&actor, Action::Create, Resource::Genre)?;
    validate_slug(&req.slug)?;
    validate_name(&req.name)?;

    state.db.insert_genre(&req.slug, &req.name)?;

    Ok((
        StatusCode::CREATED,
        Json(GenreResponse {
            name: req.name,
            slug: req.slug,
        }),
    ))
}

pub async fn destroy(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(&actor, Action::Delete, Resource::Genre)?;
    state.db.delete_genre(&slug)?;
    Ok(StatusCode::NO_CONTENT)
}
