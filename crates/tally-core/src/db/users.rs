//! User identity operations

use rusqlite::{params, OptionalExtension, Row};

use super::{now_sqlite, parse_datetime, Database};
use crate::error::Result;
use crate::models::User;

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

const USER_COLUMNS: &str = "id, email, first_name, last_name, created_at, updated_at";

impl Database {
    /// Insert a user on first sight, or refresh profile fields on later
    /// requests. Header-provided fields only overwrite when present.
    pub fn upsert_user(
        &self,
        id: &str,
        email: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, email, first_name, last_name)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 email = COALESCE(excluded.email, users.email),
                 first_name = COALESCE(excluded.first_name, users.first_name),
                 last_name = COALESCE(excluded.last_name, users.last_name),
                 updated_at = ?5",
            params![id, email, first_name, last_name, now_sqlite()],
        )?;

        let user = conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            row_to_user,
        )?;
        Ok(user)
    }

    /// Fetch a user by id
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }
}
