use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use verdict_types::api::{CategoryResponse, CreateCategoryRequest};
use verdict_types::models::Actor;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::policy::{self, Action, Resource};
use crate::query::{MAX_LIMIT, SearchQuery};

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.list_categories(
        query.search.as_deref(),
        query.limit.min(MAX_LIMIT),
        query.offset,
    )?;

    let categories: Vec<CategoryResponse> = rows
        .into_iter()
        .map(|row| CategoryResponse {
            name: row.name,
            slug: row.slug,
        })
        .collect();

    Ok(Json(categories))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    policy::authorize(&actor, Action::Create, Resource::Category)?;
    validate_slug(&req.slug)?;
    validate_name(&req.name)?;

    state.db.insert_category(&req.slug, &req.name)?;

    Ok((
        StatusCode::CREATED,
        Json(CategoryResponse {
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
    policy::authorize(&actor, Action::Delete, Resource::Category)?;
    state.db.delete_category(&slug)?;
    Ok(StatusCode::NO_CONTENT)
}

/// URL-safe slug: lowercase ASCII, digits, hyphens and underscores.
pub(crate) fn validate_slug(slug: &str) -> Result<(), ApiError> {
    let ok = !slug.is_empty()
        && slug.len() <= 50
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !ok {
        return Err(ApiError::validation(
            "slug",
            "must be 1-50 lowercase letters, digits, '-' or '_'",
        ));
    }
    Ok(())
}

pub(crate) fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() || name.len() > 256 {
        return Err(ApiError::validation("name", "must be 1-256 characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_charset_is_url_safe() {
        validate_slug("sci-fi_2").unwrap();
        assert!(validate_slug("Sci-Fi").is_err());
        assert!(validate_slug("sci fi").is_err());
        assert!(validate_slug("").is_err());
    }
}
