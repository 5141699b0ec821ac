//! Database row types — these map directly to SQLite rows.
//! Distinct from the verdict-types wire models to keep the storage layer
//! independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub confirmation_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
}

pub struct CategoryRow {
    pub slug: String,
    pub name: String,
}

pub struct GenreRow {
    pub slug: String,
    pub name: String,
}

pub struct TitleRow {
    pub id: String,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category_slug: Option<String>,
    /// Mean review score, computed by the query. None when unreviewed.
    pub rating: Option<f64>,
}

pub struct ReviewRow {
    pub id: String,
    pub title_id: String,
    pub author_id: String,
    pub author_username: String,
    pub text: String,
    pub score: i32,
    pub created_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub review_id: String,
    pub author_id: String,
    pub author_username: String,
    pub text: String,
    pub created_at: String,
}
