use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use verdict_api::auth::{AppState, AppStateInner};
use verdict_api::mailer::LogMailer;
use verdict_api::routes::router;
use verdict_db::Database;
use verdict_types::models::Role;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verdict=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("VERDICT_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("VERDICT_DB_PATH").unwrap_or_else(|_| "verdict.db".into());
    let host = std::env::var("VERDICT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("VERDICT_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Database::open(&PathBuf::from(&db_path))?;
    seed_admin(&db)?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        mailer: Arc::new(LogMailer),
    });

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Verdict server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Bootstrap admin account. Without one nobody can manage the catalog or
/// other users; the seeded account still obtains tokens through the normal
/// sign-up flow against its configured email.
fn seed_admin(db: &Database) -> anyhow::Result<()> {
    let (Ok(username), Ok(email)) = (
        std::env::var("VERDICT_ADMIN_USERNAME"),
        std::env::var("VERDICT_ADMIN_EMAIL"),
    ) else {
        return Ok(());
    };

    if db.get_user_by_username(&username)?.is_some() {
        return Ok(());
    }

    db.create_user(
        &Uuid::new_v4().to_string(),
        &username,
        &email,
        Role::Admin,
        None,
        None,
        None,
    )?;
    info!("Seeded admin user '{}'", username);

    Ok(())
}
