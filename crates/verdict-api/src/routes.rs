use axum::{
    Router, middleware,
    routing::{delete, get, patch, post},
};

use crate::auth::AppState;
use crate::middleware::require_auth;
use crate::{auth, categories, comments, genres, reviews, titles, users};

/// Assemble the full `/api/v1` surface. Read endpoints and the auth flow
/// are public; everything that writes sits behind the auth middleware, so
/// anonymous write attempts answer 401 before any policy check runs.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/token", post(auth::token))
        .route("/categories", get(categories::list))
        .route("/genres", get(genres::list))
        .route("/titles", get(titles::list))
        .route("/titles/{title_id}", get(titles::retrieve))
        .route("/titles/{title_id}/reviews", get(reviews::list))
        .route(
            "/titles/{title_id}/reviews/{review_id}",
            get(reviews::retrieve),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            get(comments::list),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
            get(comments::retrieve),
        )
        .with_state(state.clone());

    let protected = Router::new()
        .route("/categories", post(categories::create))
        .route("/categories/{slug}", delete(categories::destroy))
        .route("/genres", post(genres::create))
        .route("/genres/{slug}", delete(genres::destroy))
        .route("/titles", post(titles::create))
        .route(
            "/titles/{title_id}",
            patch(titles::update).delete(titles::destroy),
        )
        .route("/titles/{title_id}/reviews", post(reviews::create))
        .route(
            "/titles/{title_id}/reviews/{review_id}",
            patch(reviews::update).delete(reviews::destroy),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            post(comments::create),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
            patch(comments::update).delete(comments::destroy),
        )
        .route("/users", get(users::list).post(users::create))
        .route("/users/me", get(users::me).patch(users::update_me))
        .route(
            "/users/{username}",
            get(users::retrieve).patch(users::update).delete(users::destroy),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().nest("/api/v1", public.merge(protected))
}
