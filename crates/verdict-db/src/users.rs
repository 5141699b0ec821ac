use rusqlite::{Connection, OptionalExtension, params};
use verdict_types::models::Role;

use crate::error::unique_violation;
use crate::models::UserRow;
use crate::{Database, Result, StoreError, now_timestamp};

/// Partial update applied to a user record. `None` leaves the column as is.
#[derive(Debug, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

impl Database {
    /// Sign-up create-or-refresh. Resubmitting the same (username, email)
    /// pair replaces the confirmation code; either half of the pair already
    /// belonging to a different identity is a conflict keyed to that field.
    pub fn upsert_signup(
        &self,
        new_id: &str,
        username: &str,
        email: &str,
        code: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            match query_user_by_username(&tx, username)? {
                Some(user) => {
                    if user.email != email {
                        return Err(StoreError::Conflict { field: "username" });
                    }
                    tx.execute(
                        "UPDATE users SET confirmation_code = ?1 WHERE id = ?2",
                        params![code, user.id],
                    )?;
                }
                None => {
                    let email_taken: Option<i64> = tx
                        .query_row("SELECT 1 FROM users WHERE email = ?1", [email], |row| {
                            row.get(0)
                        })
                        .optional()?;
                    if email_taken.is_some() {
                        return Err(StoreError::Conflict { field: "email" });
                    }

                    tx.execute(
                        "INSERT INTO users (id, username, email, role, confirmation_code, created_at)
                         VALUES (?1, ?2, ?3, 'user', ?4, ?5)",
                        params![new_id, username, email, code, now_timestamp()],
                    )
                    .map_err(|e| match unique_violation(&e) {
                        Some(col) if col.contains("email") => {
                            StoreError::Conflict { field: "email" }
                        }
                        Some(_) => StoreError::Conflict { field: "username" },
                        None => e.into(),
                    })?;
                }
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Direct creation on the admin surface. No confirmation code is set;
    /// the user obtains one through sign-up.
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        role: Role,
        first_name: Option<&str>,
        last_name: Option<&str>,
        bio: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, role, first_name, last_name, bio, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id,
                    username,
                    email,
                    role.as_str(),
                    first_name,
                    last_name,
                    bio,
                    now_timestamp()
                ],
            )
            .map_err(|e| match unique_violation(&e) {
                Some(col) if col.contains("email") => StoreError::Conflict { field: "email" },
                Some(_) => StoreError::Conflict { field: "username" },
                None => e.into(),
            })?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                    [id],
                    user_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_users(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let filter = match search {
                Some(_) => "WHERE instr(lower(username), ?1) > 0",
                None => "WHERE ?1 = ''",
            };
            let sql = format!(
                "SELECT {} FROM users {} ORDER BY username LIMIT ?2 OFFSET ?3",
                USER_COLUMNS, filter
            );

            let needle = search.map(|s| s.to_lowercase()).unwrap_or_default();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![needle, limit, offset], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn update_user(&self, username: &str, patch: &UserPatch) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let user = query_user_by_username(&tx, username)?.ok_or(StoreError::NotFound)?;

            let email = patch.email.as_deref().unwrap_or(&user.email);
            let role = patch.role.map(Role::as_str).unwrap_or(user.role.as_str());
            let first_name = patch.first_name.as_deref().or(user.first_name.as_deref());
            let last_name = patch.last_name.as_deref().or(user.last_name.as_deref());
            let bio = patch.bio.as_deref().or(user.bio.as_deref());

            tx.execute(
                "UPDATE users SET email = ?1, role = ?2, first_name = ?3, last_name = ?4, bio = ?5
                 WHERE id = ?6",
                params![email, role, first_name, last_name, bio, user.id],
            )
            .map_err(|e| match unique_violation(&e) {
                Some(_) => StoreError::Conflict { field: "email" },
                None => e.into(),
            })?;

            let updated =
                query_user_by_username(&tx, username)?.ok_or(StoreError::NotFound)?;
            tx.commit()?;
            Ok(updated)
        })
    }

    pub fn delete_user(&self, username: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE username = ?1", [username])?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }
}

const USER_COLUMNS: &str =
    "id, username, email, role, confirmation_code, first_name, last_name, bio, created_at";

fn user_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        confirmation_code: row.get(4)?,
        first_name: row.get(5)?,
        last_name: row.get(6)?,
        bio: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            [username],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}
