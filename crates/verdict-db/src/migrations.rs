use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                TEXT PRIMARY KEY,
            username          TEXT NOT NULL UNIQUE,
            email             TEXT NOT NULL UNIQUE,
            role              TEXT NOT NULL DEFAULT 'user',
            confirmation_code TEXT,
            first_name        TEXT,
            last_name         TEXT,
            bio               TEXT,
            created_at        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS categories (
            slug    TEXT PRIMARY KEY,
            name    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS genres (
            slug    TEXT PRIMARY KEY,
            name    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS titles (
            id            TEXT PRIMARY KEY,
            name          TEXT NOT NULL,
            year          INTEGER NOT NULL,
            description   TEXT,
            category_slug TEXT REFERENCES categories(slug) ON DELETE SET NULL
        );

        CREATE TABLE IF NOT EXISTS title_genres (
            title_id    TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
            genre_slug  TEXT NOT NULL REFERENCES genres(slug) ON DELETE CASCADE,
            UNIQUE(title_id, genre_slug)
        );

        CREATE INDEX IF NOT EXISTS idx_title_genres_title
            ON title_genres(title_id);

        CREATE TABLE IF NOT EXISTS reviews (
            id          TEXT PRIMARY KEY,
            title_id    TEXT NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
            author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            text        TEXT NOT NULL,
            score       INTEGER NOT NULL CHECK (score BETWEEN 1 AND 10),
            created_at  TEXT NOT NULL,
            UNIQUE(title_id, author_id)
        );

        CREATE INDEX IF NOT EXISTS idx_reviews_title
            ON reviews(title_id, created_at);

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            review_id   TEXT NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
            author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            text        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_review
            ON comments(review_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
