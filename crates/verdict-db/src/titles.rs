use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::models::{GenreRow, TitleRow};
use crate::{Database, Result, StoreError, TitleFilter};

/// The rating is derived at read time as the unrounded mean of review
/// scores; AVG over zero rows is NULL, never 0.
const TITLE_COLUMNS: &str = "t.id, t.name, t.year, t.description, t.category_slug, \
     (SELECT AVG(r.score) FROM reviews r WHERE r.title_id = t.id) AS rating";

impl Database {
    pub fn insert_title(
        &self,
        id: &str,
        name: &str,
        year: i32,
        description: Option<&str>,
        category: Option<&str>,
        genres: &[String],
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(slug) = category {
                require_slug(&tx, "categories", slug, "category")?;
            }

            tx.execute(
                "INSERT INTO titles (id, name, year, description, category_slug)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, name, year, description, category],
            )?;

            attach_genres(&tx, id, genres)?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_title(&self, id: &str) -> Result<Option<TitleRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM titles t WHERE t.id = ?1", TITLE_COLUMNS);
            let row = conn.query_row(&sql, [id], title_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn list_titles(
        &self,
        filter: &TitleFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<TitleRow>> {
        self.with_conn(|conn| {
            let (where_clause, mut params) = filter.predicate();

            params.push(Value::Integer(i64::from(limit)));
            let limit_slot = params.len();
            params.push(Value::Integer(i64::from(offset)));
            let offset_slot = params.len();

            let sql = format!(
                "SELECT {} FROM titles t {} ORDER BY t.name COLLATE NOCASE, t.id
                 LIMIT ?{} OFFSET ?{}",
                TITLE_COLUMNS, where_clause, limit_slot, offset_slot
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), title_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn update_title(
        &self,
        id: &str,
        name: Option<&str>,
        year: Option<i32>,
        description: Option<&str>,
        category: Option<&str>,
        genres: Option<&[String]>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let sql = format!("SELECT {} FROM titles t WHERE t.id = ?1", TITLE_COLUMNS);
            let current = tx
                .query_row(&sql, [id], title_from_row)
                .optional()?
                .ok_or(StoreError::NotFound)?;

            if let Some(slug) = category {
                require_slug(&tx, "categories", slug, "category")?;
            }

            tx.execute(
                "UPDATE titles SET name = ?1, year = ?2, description = ?3, category_slug = ?4
                 WHERE id = ?5",
                params![
                    name.unwrap_or(&current.name),
                    year.unwrap_or(current.year),
                    description.or(current.description.as_deref()),
                    category.or(current.category_slug.as_deref()),
                    id
                ],
            )?;

            if let Some(genres) = genres {
                // PATCH with a genre list replaces the tag set.
                tx.execute("DELETE FROM title_genres WHERE title_id = ?1", [id])?;
                attach_genres(&tx, id, genres)?;
            }

            tx.commit()?;
            Ok(())
        })
    }

    pub fn delete_title(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM titles WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    /// Batch-fetch genre tags for a set of title IDs, keyed by title.
    pub fn genres_for_titles(&self, title_ids: &[String]) -> Result<Vec<(String, GenreRow)>> {
        if title_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=title_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT tg.title_id, g.slug, g.name
                 FROM title_genres tg
                 JOIN genres g ON g.slug = tg.genre_slug
                 WHERE tg.title_id IN ({})
                 ORDER BY g.slug",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = title_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok((
                        row.get(0)?,
                        GenreRow {
                            slug: row.get(1)?,
                            name: row.get(2)?,
                        },
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn title_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<TitleRow, rusqlite::Error> {
    Ok(TitleRow {
        id: row.get(0)?,
        name: row.get(1)?,
        year: row.get(2)?,
        description: row.get(3)?,
        category_slug: row.get(4)?,
        rating: row.get(5)?,
    })
}

fn require_slug(
    conn: &Connection,
    table: &str,
    slug: &str,
    field: &'static str,
) -> Result<()> {
    let sql = format!("SELECT 1 FROM {} WHERE slug = ?1", table);
    let exists: Option<i64> = conn.query_row(&sql, [slug], |row| row.get(0)).optional()?;
    if exists.is_none() {
        return Err(StoreError::BadReference { field });
    }
    Ok(())
}

fn attach_genres(conn: &Connection, title_id: &str, genres: &[String]) -> Result<()> {
    for slug in genres {
        require_slug(conn, "genres", slug, "genre")?;
        conn.execute(
            "INSERT OR IGNORE INTO title_genres (title_id, genre_slug) VALUES (?1, ?2)",
            params![title_id, slug],
        )?;
    }
    Ok(())
}
