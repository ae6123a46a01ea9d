//! Per-user Gmail OAuth token storage
//!
//! Tokens are scoped to a user id and carry an expiry; callers refresh
//! through the Gmail client before use rather than assuming freshness.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{now_sqlite, parse_datetime, Database};
use crate::error::Result;
use crate::models::GmailCredentials;

fn row_to_credentials(row: &Row) -> rusqlite::Result<GmailCredentials> {
    Ok(GmailCredentials {
        user_id: row.get(0)?,
        access_token: row.get(1)?,
        refresh_token: row.get(2)?,
        expires_at: parse_datetime(&row.get::<_, String>(3)?),
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

impl Database {
    /// Store (or replace) a user's Gmail tokens.
    ///
    /// A refresh response omits the refresh token; passing None keeps the
    /// one already on file.
    pub fn store_gmail_credentials(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO gmail_credentials (user_id, access_token, refresh_token, expires_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                 access_token = excluded.access_token,
                 refresh_token = COALESCE(excluded.refresh_token, gmail_credentials.refresh_token),
                 expires_at = excluded.expires_at,
                 updated_at = ?5",
            params![
                user_id,
                access_token,
                refresh_token,
                expires_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                now_sqlite(),
            ],
        )?;
        Ok(())
    }

    pub fn get_gmail_credentials(&self, user_id: &str) -> Result<Option<GmailCredentials>> {
        let conn = self.conn()?;
        let credentials = conn
            .query_row(
                "SELECT user_id, access_token, refresh_token, expires_at, created_at, updated_at
                 FROM gmail_credentials WHERE user_id = ?1",
                params![user_id],
                row_to_credentials,
            )
            .optional()?;
        Ok(credentials)
    }

    pub fn delete_gmail_credentials(&self, user_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM gmail_credentials WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(())
    }
}
