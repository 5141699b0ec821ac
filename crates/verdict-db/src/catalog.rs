use rusqlite::{Connection, params};

use crate::error::unique_violation;
use crate::models::{CategoryRow, GenreRow};
use crate::{Database, Result, StoreError};

impl Database {
    // -- Categories --

    pub fn insert_category(&self, slug: &str, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO categories (slug, name) VALUES (?1, ?2)",
                params![slug, name],
            )
            .map_err(|e| match unique_violation(&e) {
                Some(_) => StoreError::Conflict { field: "slug" },
                None => e.into(),
            })?;
            Ok(())
        })
    }

    pub fn get_category(&self, slug: &str) -> Result<Option<CategoryRow>> {
        self.with_conn(|conn| {
            query_slug_row(conn, "categories", slug)
                .map(|row| row.map(|(slug, name)| CategoryRow { slug, name }))
        })
    }

    pub fn list_categories(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CategoryRow>> {
        self.with_conn(|conn| {
            query_slug_table(conn, "categories", search, limit, offset)
                .map(|rows| {
                    rows.into_iter()
                        .map(|(slug, name)| CategoryRow { slug, name })
                        .collect()
                })
        })
    }

    pub fn delete_category(&self, slug: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM categories WHERE slug = ?1", [slug])?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    /// Batch-fetch categories for a set of slugs (title list assembly).
    pub fn categories_by_slugs(&self, slugs: &[String]) -> Result<Vec<CategoryRow>> {
        if slugs.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=slugs.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT slug, name FROM categories WHERE slug IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = slugs
                .iter()
                .map(|s| s as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(CategoryRow {
                        slug: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Genres --

    pub fn insert_genre(&self, slug: &str, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO genres (slug, name) VALUES (?1, ?2)",
                params![slug, name],
            )
            .map_err(|e| match unique_violation(&e) {
                Some(_) => StoreError::Conflict { field: "slug" },
                None => e.into(),
            })?;
            Ok(())
        })
    }

    pub fn list_genres(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<GenreRow>> {
        self.with_conn(|conn| {
            query_slug_table(conn, "genres", search, limit, offset).map(|rows| {
                rows.into_iter()
                    .map(|(slug, name)| GenreRow { slug, name })
                    .collect()
            })
        })
    }

    pub fn delete_genre(&self, slug: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM genres WHERE slug = ?1", [slug])?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }
}

// Categories and genres share the same (slug, name) shape; the table name is
// interpolated from a fixed set, never from input.

fn query_slug_row(
    conn: &Connection,
    table: &str,
    slug: &str,
) -> Result<Option<(String, String)>> {
    use rusqlite::OptionalExtension;

    let sql = format!("SELECT slug, name FROM {} WHERE slug = ?1", table);
    let row = conn
        .query_row(&sql, [slug], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;
    Ok(row)
}

fn query_slug_table(
    conn: &Connection,
    table: &str,
    search: Option<&str>,
    limit: u32,
    offset: u32,
) -> Result<Vec<(String, String)>> {
    let filter = match search {
        Some(_) => "WHERE instr(lower(name), ?1) > 0",
        None => "WHERE ?1 = ''",
    };
    let sql = format!(
        "SELECT slug, name FROM {} {} ORDER BY slug LIMIT ?2 OFFSET ?3",
        table, filter
    );

    let needle = search.map(|s| s.to_lowercase()).unwrap_or_default();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![needle, limit, offset], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
