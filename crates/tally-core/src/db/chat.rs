//! Assistant conversations and messages

use rusqlite::{params, OptionalExtension, Row};

use super::{now_sqlite, parse_datetime, Database};
use crate::error::Result;
use crate::models::{ChatConversation, ChatMessage, ChatRole};

fn row_to_conversation(row: &Row) -> rusqlite::Result<ChatConversation> {
    Ok(ChatConversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: parse_datetime(&row.get::<_, String>(2)?),
        updated_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn row_to_message(row: &Row) -> rusqlite::Result<ChatMessage> {
    let role_str: String = row.get(2)?;
    Ok(ChatMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: role_str.parse().unwrap_or(ChatRole::User),
        content: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

impl Database {
    /// The user's latest conversation, if any
    pub fn latest_conversation(&self, user_id: &str) -> Result<Option<ChatConversation>> {
        let conn = self.conn()?;
        let conversation = conn
            .query_row(
                "SELECT id, user_id, created_at, updated_at FROM chat_conversations
                 WHERE user_id = ?1 ORDER BY id DESC LIMIT 1",
                params![user_id],
                row_to_conversation,
            )
            .optional()?;
        Ok(conversation)
    }

    /// The user's latest conversation, created if none exists
    pub fn ensure_conversation(&self, user_id: &str) -> Result<ChatConversation> {
        if let Some(conversation) = self.latest_conversation(user_id)? {
            return Ok(conversation);
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chat_conversations (user_id) VALUES (?1)",
            params![user_id],
        )?;
        let id = conn.last_insert_rowid();
        let conversation = conn.query_row(
            "SELECT id, user_id, created_at, updated_at FROM chat_conversations WHERE id = ?1",
            params![id],
            row_to_conversation,
        )?;
        Ok(conversation)
    }

    /// Append a message and bump the conversation's updated_at
    pub fn append_chat_message(
        &self,
        conversation_id: i64,
        role: ChatRole,
        content: &str,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chat_messages (conversation_id, role, content) VALUES (?1, ?2, ?3)",
            params![conversation_id, role.as_str(), content],
        )?;
        let id = conn.last_insert_rowid();
        conn.execute(
            "UPDATE chat_conversations SET updated_at = ?1 WHERE id = ?2",
            params![now_sqlite(), conversation_id],
        )?;
        Ok(id)
    }

    /// A conversation's messages in chronological order
    pub fn list_chat_messages(&self, conversation_id: i64) -> Result<Vec<ChatMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, created_at FROM chat_messages
             WHERE conversation_id = ?1 ORDER BY id",
        )?;
        let messages = stmt
            .query_map(params![conversation_id], row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }
}
