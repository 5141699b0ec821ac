use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use verdict_db::{StoreError, TitleFilter};
use verdict_db::models::TitleRow;
use verdict_types::api::{
    CategoryResponse, CreateTitleRequest, GenreResponse, TitleResponse, UpdateTitleRequest,
};
use verdict_types::models::Actor;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::parse_uuid;
use crate::policy::{self, Action, Resource};
use crate::query::MAX_LIMIT;

#[derive(Debug, Deserialize)]
pub struct TitleListQuery {
    /// Case-insensitive substring of the title name.
    pub name: Option<String>,
    pub year: Option<i32>,
    /// Category slug, exact.
    pub category: Option<String>,
    /// Comma-separated genre slugs; a title matches if tagged with any.
    pub genre: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<TitleListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = TitleFilter {
        name: query.name,
        year: query.year,
        category: query.category,
        genres: query
            .genre
            .map(|g| {
                g.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    };
    let limit = query.limit.min(MAX_LIMIT);
    let offset = query.offset;

    // The rating subquery makes this the heaviest read path; keep it off
    // the async runtime.
    let db = state.clone();
    let (rows, tags, categories) = tokio::task::spawn_blocking(move || {
        let rows = db.db.list_titles(&filter, limit, offset)?;

        let title_ids: Vec<String> = rows.iter().map(|t| t.id.clone()).collect();
        let tags = db.db.genres_for_titles(&title_ids)?;

        let slugs: Vec<String> = rows
            .iter()
            .filter_map(|t| t.category_slug.clone())
            .collect();
        let categories = db.db.categories_by_slugs(&slugs)?;

        Ok::<_, StoreError>((rows, tags, categories))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed"))
    })??;

    let mut genre_map: HashMap<String, Vec<GenreResponse>> = HashMap::new();
    for (title_id, genre) in tags {
        genre_map.entry(title_id).or_default().push(GenreResponse {
            name: genre.name,
            slug: genre.slug,
        });
    }

    let category_map: HashMap<String, CategoryResponse> = categories
        .into_iter()
        .map(|c| {
            (
                c.slug.clone(),
                CategoryResponse {
                    name: c.name,
                    slug: c.slug,
                },
            )
        })
        .collect();

    let titles: Vec<TitleResponse> = rows
        .into_iter()
        .map(|row| {
            let genre = genre_map.remove(&row.id).unwrap_or_default();
            let category = row
                .category_slug
                .as_ref()
                .and_then(|slug| category_map.get(slug).cloned());
            title_response(row, category, genre)
        })
        .collect();

    Ok(Json(titles))
}

pub async fn retrieve(
    State(state): State<AppState>,
    Path(title_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_title(&title_id.to_string())?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(assemble_one(&state, row)?))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateTitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(&actor, Action::Create, Resource::Title)?;
    validate_title_name(&req.name)?;
    validate_year(req.year)?;

    let id = Uuid::new_v4();
    state.db.insert_title(
        &id.to_string(),
        &req.name,
        req.year,
        req.description.as_deref(),
        req.category.as_deref(),
        &req.genre,
    )?;

    let row = state
        .db
        .get_title(&id.to_string())?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("title vanished after insert")))?;

    Ok((StatusCode::CREATED, Json(assemble_one(&state, row)?)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(title_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<UpdateTitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(&actor, Action::Update, Resource::Title)?;
    if let Some(name) = &req.name {
        validate_title_name(name)?;
    }
    if let Some(year) = req.year {
        validate_year(year)?;
    }

    let id = title_id.to_string();
    state.db.update_title(
        &id,
        req.name.as_deref(),
        req.year,
        req.description.as_deref(),
        req.category.as_deref(),
        req.genre.as_deref(),
    )?;

    let row = state.db.get_title(&id)?.ok_or(ApiError::NotFound)?;
    Ok(Json(assemble_one(&state, row)?))
}

pub async fn destroy(
    State(state): State<AppState>,
    Path(title_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(&actor, Action::Delete, Resource::Title)?;
    state.db.delete_title(&title_id.to_string())?;
    Ok(StatusCode::NO_CONTENT)
}

/// Works may be catalogued before release, but not from the future.
pub(crate) fn validate_year(year: i32) -> Result<(), ApiError> {
    let current = Utc::now().year();
    if year > current {
        return Err(ApiError::validation(
            "year",
            format!("cannot be later than {}", current),
        ));
    }
    Ok(())
}

pub(crate) fn validate_title_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::validation("name", "must not be empty"));
    }
    Ok(())
}

fn assemble_one(state: &AppState, row: TitleRow) -> Result<TitleResponse, ApiError> {
    let tags = state.db.genres_for_titles(&[row.id.clone()])?;
    let genre = tags
        .into_iter()
        .map(|(_, g)| GenreResponse {
            name: g.name,
            slug: g.slug,
        })
        .collect();

    let category = match &row.category_slug {
        Some(slug) => state.db.get_category(slug)?.map(|c| CategoryResponse {
            name: c.name,
            slug: c.slug,
        }),
        None => None,
    };

    Ok(title_response(row, category, genre))
}

fn title_response(
    row: TitleRow,
    category: Option<CategoryResponse>,
    genre: Vec<GenreResponse>,
) -> TitleResponse {
    TitleResponse {
        id: parse_uuid(&row.id, "title id"),
        name: row.name,
        year: row.year,
        rating: row.rating,
        description: row.description,
        category,
        genre,
    }
}
