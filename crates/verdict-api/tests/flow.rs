//! End-to-end tests over the assembled router: sign-up, token issuance,
//! catalog management, reviews and ratings, and the self-service profile
//! path, against an in-memory database and a recording mailer.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use verdict_api::auth::{AppState, AppStateInner};
use verdict_api::mailer::RecordingMailer;
use verdict_api::routes::router;
use verdict_db::{Database, UserPatch};
use verdict_types::models::Role;

struct TestServer {
    app: Router,
    state: AppState,
    mailer: Arc<RecordingMailer>,
}

fn server() -> TestServer {
    let mailer = Arc::new(RecordingMailer::default());
    let state: AppState = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "test-secret".into(),
        mailer: mailer.clone(),
    });

    TestServer {
        app: router(state.clone()),
        state,
        mailer,
    }
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

/// The confirmation code is the last token of the mail body.
fn last_code(mailer: &RecordingMailer) -> String {
    let sent = mailer.sent.lock().unwrap();
    let body = &sent.last().expect("no mail dispatched").body;
    body.rsplit(' ').next().unwrap().trim().to_string()
}

/// Run the full sign-up → token exchange for a fresh identity.
async fn obtain_token(ts: &TestServer, username: &str, email: &str) -> String {
    let (status, _) = send(
        &ts.app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({ "username": username, "email": email })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let code = last_code(&ts.mailer);
    let (status, body) = send(
        &ts.app,
        "POST",
        "/api/v1/auth/token",
        None,
        Some(json!({ "username": username, "confirmation_code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    body["token"].as_str().unwrap().to_string()
}

fn promote(ts: &TestServer, username: &str, role: Role) {
    let patch = UserPatch {
        role: Some(role),
        ..Default::default()
    };
    ts.state.db.update_user(username, &patch).unwrap();
}

async fn admin_token(ts: &TestServer) -> String {
    let token = obtain_token(ts, "boss", "boss@example.com").await;
    promote(ts, "boss", Role::Admin);
    token
}

#[tokio::test]
async fn signup_and_token_issuance() {
    let ts = server();

    let (status, body) = send(
        &ts.app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({ "username": "alice", "email": "alice@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let first_code = last_code(&ts.mailer);

    // Unknown user is 404, wrong code is a field-keyed 400.
    let (status, _) = send(
        &ts.app,
        "POST",
        "/api/v1/auth/token",
        None,
        Some(json!({ "username": "nobody", "confirmation_code": "0000" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &ts.app,
        "POST",
        "/api/v1/auth/token",
        None,
        Some(json!({ "username": "alice", "confirmation_code": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("confirmation_code").is_some());

    // Correct code issues a token, repeatably.
    for _ in 0..2 {
        let (status, body) = send(
            &ts.app,
            "POST",
            "/api/v1/auth/token",
            None,
            Some(json!({ "username": "alice", "confirmation_code": first_code })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["token"].as_str().unwrap().len() > 20);
    }

    // Resubmitting the same pair regenerates the code.
    let (status, _) = send(
        &ts.app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({ "username": "alice", "email": "alice@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let second_code = last_code(&ts.mailer);
    assert_eq!(ts.mailer.sent.lock().unwrap().len(), 2);
    assert_ne!(first_code, second_code);
}

#[tokio::test]
async fn signup_validation() {
    let ts = server();

    let (status, body) = send(
        &ts.app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({ "username": "me", "email": "me@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("username").is_some());

    // Username and email belong to their first registrant.
    let _ = obtain_token(&ts, "alice", "alice@example.com").await;

    let (status, body) = send(
        &ts.app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({ "username": "alice", "email": "other@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("username").is_some());

    let (status, body) = send(
        &ts.app,
        "POST",
        "/api/v1/auth/signup",
        None,
        Some(json!({ "username": "bob", "email": "alice@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("email").is_some());
}

#[tokio::test]
async fn catalog_writes_need_admin() {
    let ts = server();

    // Anonymous write: 401 from the middleware.
    let (status, _) = send(
        &ts.app,
        "POST",
        "/api/v1/categories",
        None,
        Some(json!({ "name": "Films", "slug": "films" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Authenticated but not admin: 403 from the policy.
    let alice = obtain_token(&ts, "alice", "alice@example.com").await;
    let (status, _) = send(
        &ts.app,
        "POST",
        "/api/v1/categories",
        Some(&alice),
        Some(json!({ "name": "Films", "slug": "films" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = admin_token(&ts).await;
    let (status, _) = send(
        &ts.app,
        "POST",
        "/api/v1/categories",
        Some(&admin),
        Some(json!({ "name": "Films", "slug": "films" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Anyone reads.
    let (status, body) = send(&ts.app, "GET", "/api/v1/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Unknown references and future years are field-keyed 400s.
    let (status, body) = send(
        &ts.app,
        "POST",
        "/api/v1/titles",
        Some(&admin),
        Some(json!({ "name": "Solaris", "year": 1972, "genre": ["western"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("genre").is_some());

    let (status, body) = send(
        &ts.app,
        "POST",
        "/api/v1/titles",
        Some(&admin),
        Some(json!({ "name": "From The Future", "year": 3000 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("year").is_some());
}

async fn seed_title(ts: &TestServer, admin: &str, name: &str, genres: Value) -> String {
    let (status, body) = send(
        &ts.app,
        "POST",
        "/api/v1/titles",
        Some(admin),
        Some(json!({ "name": name, "year": 1972, "category": "films", "genre": genres })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn reviews_ratings_and_moderation() {
    let ts = server();
    let admin = admin_token(&ts).await;

    for (uri, payload) in [
        ("/api/v1/categories", json!({ "name": "Films", "slug": "films" })),
        ("/api/v1/genres", json!({ "name": "Drama", "slug": "drama" })),
    ] {
        let (status, _) = send(&ts.app, "POST", uri, Some(&admin), Some(payload)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let title_id = seed_title(&ts, &admin, "Solaris", json!(["drama"])).await;

    // Unreviewed titles have no rating at all.
    let uri = format!("/api/v1/titles/{}", title_id);
    let (_, body) = send(&ts.app, "GET", &uri, None, None).await;
    assert!(body["rating"].is_null());
    assert_eq!(body["category"]["slug"], "films");
    assert_eq!(body["genre"][0]["slug"], "drama");

    let alice = obtain_token(&ts, "alice", "alice@example.com").await;
    let bob = obtain_token(&ts, "bob", "bob@example.com").await;

    let reviews_uri = format!("/api/v1/titles/{}/reviews", title_id);
    let (status, review) = send(
        &ts.app,
        "POST",
        &reviews_uri,
        Some(&alice),
        Some(json!({ "text": "a masterpiece", "score": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(review["author"], "alice");
    let review_id = review["id"].as_str().unwrap().to_string();

    // One review per (title, author).
    let (status, _) = send(
        &ts.app,
        "POST",
        &reviews_uri,
        Some(&alice),
        Some(json!({ "text": "changed my mind", "score": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &ts.app,
        "POST",
        &reviews_uri,
        Some(&bob),
        Some(json!({ "text": "slow", "score": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Rating is the unrounded mean.
    let (_, body) = send(&ts.app, "GET", &uri, None, None).await;
    assert_eq!(body["rating"].as_f64().unwrap(), 8.5);

    // Strangers cannot edit; authors and moderators can.
    let review_uri = format!("{}/{}", reviews_uri, review_id);
    let (status, _) = send(
        &ts.app,
        "PATCH",
        &review_uri,
        Some(&bob),
        Some(json!({ "score": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &ts.app,
        "PATCH",
        &review_uri,
        Some(&alice),
        Some(json!({ "score": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 9);
    assert_eq!(body["text"], "a masterpiece");

    promote(&ts, "bob", Role::Moderator);
    let (status, _) = send(
        &ts.app,
        "PATCH",
        &review_uri,
        Some(&bob),
        Some(json!({ "text": "[moderated]" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Comments hang off the review and die with it.
    let comments_uri = format!("{}/comments", review_uri);
    let (status, comment) = send(
        &ts.app,
        "POST",
        &comments_uri,
        Some(&bob),
        Some(json!({ "text": "agreed" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["author"], "bob");

    let (status, body) = send(&ts.app, "GET", &comments_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send(&ts.app, "DELETE", &review_uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&ts.app, "GET", &comments_uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn title_filters_combine_genres_as_union() {
    let ts = server();
    let admin = admin_token(&ts).await;

    let (status, _) = send(
        &ts.app,
        "POST",
        "/api/v1/categories",
        Some(&admin),
        Some(json!({ "name": "Films", "slug": "films" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    for (name, slug) in [("Drama", "drama"), ("Comedy", "comedy"), ("Thriller", "thriller")] {
        let (status, _) = send(
            &ts.app,
            "POST",
            "/api/v1/genres",
            Some(&admin),
            Some(json!({ "name": name, "slug": slug })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    seed_title(&ts, &admin, "Ikiru", json!(["drama"])).await;
    seed_title(&ts, &admin, "Playtime", json!(["comedy"])).await;
    seed_title(&ts, &admin, "Vertigo", json!(["thriller"])).await;

    let (status, body) = send(
        &ts.app,
        "GET",
        "/api/v1/titles?genre=drama,comedy",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ikiru", "Playtime"]);

    let (_, body) = send(&ts.app, "GET", "/api/v1/titles?name=verti", None, None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&ts.app, "GET", "/api/v1/titles?year=1890", None, None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn self_service_profile_keeps_role() {
    let ts = server();
    let alice = obtain_token(&ts, "alice", "alice@example.com").await;

    let (status, body) = send(&ts.app, "GET", "/api/v1/users/me", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");

    // A submitted role change is silently discarded; other fields apply.
    let (status, body) = send(
        &ts.app,
        "PATCH",
        "/api/v1/users/me",
        Some(&alice),
        Some(json!({ "bio": "cinephile", "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");
    assert_eq!(body["bio"], "cinephile");

    let (status, _) = send(&ts.app, "GET", "/api/v1/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_management_is_admin_only() {
    let ts = server();
    let alice = obtain_token(&ts, "alice", "alice@example.com").await;

    let (status, _) = send(&ts.app, "GET", "/api/v1/users", Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = admin_token(&ts).await;
    let (status, body) = send(&ts.app, "GET", "/api/v1/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(
        &ts.app,
        "POST",
        "/api/v1/users",
        Some(&admin),
        Some(json!({ "username": "mod", "email": "mod@example.com", "role": "moderator" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "moderator");

    let (status, body) = send(
        &ts.app,
        "PATCH",
        "/api/v1/users/alice",
        Some(&admin),
        Some(json!({ "role": "moderator" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "moderator");

    let (status, _) = send(&ts.app, "DELETE", "/api/v1/users/mod", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&ts.app, "GET", "/api/v1/users/mod", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
