use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::unique_violation;
use crate::models::{CommentRow, ReviewRow};
use crate::{Database, Result, StoreError, fmt_timestamp};

impl Database {
    // -- Reviews --

    /// Insert-or-reject: the UNIQUE(title_id, author_id) constraint closes
    /// the concurrent-duplicate race at the storage layer.
    pub fn insert_review(
        &self,
        id: &str,
        title_id: &str,
        author_id: &str,
        text: &str,
        score: i32,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO reviews (id, title_id, author_id, text, score, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    title_id,
                    author_id,
                    text,
                    score,
                    fmt_timestamp(created_at)
                ],
            )
            .map_err(|e| match unique_violation(&e) {
                Some(_) => StoreError::Conflict { field: "review" },
                None => e.into(),
            })?;
            Ok(())
        })
    }

    pub fn list_reviews(&self, title_id: &str, limit: u32, offset: u32) -> Result<Vec<ReviewRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.title_id, r.author_id, u.username, r.text, r.score, r.created_at
                 FROM reviews r
                 JOIN users u ON u.id = r.author_id
                 WHERE r.title_id = ?1
                 ORDER BY r.created_at ASC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let rows = stmt
                .query_map(params![title_id, limit, offset], review_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_review(&self, title_id: &str, review_id: &str) -> Result<Option<ReviewRow>> {
        self.with_conn(|conn| query_review(conn, title_id, review_id))
    }

    pub fn update_review(
        &self,
        title_id: &str,
        review_id: &str,
        text: Option<&str>,
        score: Option<i32>,
    ) -> Result<ReviewRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let current =
                query_review(&tx, title_id, review_id)?.ok_or(StoreError::NotFound)?;

            tx.execute(
                "UPDATE reviews SET text = ?1, score = ?2 WHERE id = ?3",
                params![
                    text.unwrap_or(&current.text),
                    score.unwrap_or(current.score),
                    review_id
                ],
            )?;

            let updated =
                query_review(&tx, title_id, review_id)?.ok_or(StoreError::NotFound)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    pub fn delete_review(&self, title_id: &str, review_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM reviews WHERE id = ?1 AND title_id = ?2",
                params![review_id, title_id],
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    // -- Comments --

    pub fn insert_comment(
        &self,
        id: &str,
        review_id: &str,
        author_id: &str,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO comments (id, review_id, author_id, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, review_id, author_id, text, fmt_timestamp(created_at)],
            )?;
            Ok(())
        })
    }

    pub fn list_comments(
        &self,
        review_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.review_id, c.author_id, u.username, c.text, c.created_at
                 FROM comments c
                 JOIN users u ON u.id = c.author_id
                 WHERE c.review_id = ?1
                 ORDER BY c.created_at ASC
                 LIMIT ?2 OFFSET ?3",
            )?;

            let rows = stmt
                .query_map(params![review_id, limit, offset], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_comment(&self, review_id: &str, comment_id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, review_id, comment_id))
    }

    pub fn update_comment(
        &self,
        review_id: &str,
        comment_id: &str,
        text: Option<&str>,
    ) -> Result<CommentRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let current =
                query_comment(&tx, review_id, comment_id)?.ok_or(StoreError::NotFound)?;

            tx.execute(
                "UPDATE comments SET text = ?1 WHERE id = ?2",
                params![text.unwrap_or(&current.text), comment_id],
            )?;

            let updated =
                query_comment(&tx, review_id, comment_id)?.ok_or(StoreError::NotFound)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    pub fn delete_comment(&self, review_id: &str, comment_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM comments WHERE id = ?1 AND review_id = ?2",
                params![comment_id, review_id],
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }
}

fn review_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<ReviewRow, rusqlite::Error> {
    Ok(ReviewRow {
        id: row.get(0)?,
        title_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        text: row.get(4)?,
        score: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn comment_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<CommentRow, rusqlite::Error> {
    Ok(CommentRow {
        id: row.get(0)?,
        review_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row.get(3)?,
        text: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn query_review(
    conn: &Connection,
    title_id: &str,
    review_id: &str,
) -> Result<Option<ReviewRow>> {
    let row = conn
        .query_row(
            "SELECT r.id, r.title_id, r.author_id, u.username, r.text, r.score, r.created_at
             FROM reviews r
             JOIN users u ON u.id = r.author_id
             WHERE r.id = ?1 AND r.title_id = ?2",
            params![review_id, title_id],
            review_from_row,
        )
        .optional()?;
    Ok(row)
}

fn query_comment(
    conn: &Connection,
    review_id: &str,
    comment_id: &str,
) -> Result<Option<CommentRow>> {
    let row = conn
        .query_row(
            "SELECT c.id, c.review_id, c.author_id, u.username, c.text, c.created_at
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.id = ?1 AND c.review_id = ?2",
            params![comment_id, review_id],
            comment_from_row,
        )
        .optional()?;
    Ok(row)
}
