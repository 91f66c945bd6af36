//! Assistant chat sessions and message history

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{ChatGoal, ChatRecord, ChatSession, ChatStage};

const SESSION_COLUMNS: &str = "id, user_id, session_id, stage, goal_type, goal_cost, \
     monthly_saving, timeline, products, created_at, updated_at";

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<ChatSession> {
    let stage: String = row.get(3)?;
    let products: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    Ok(ChatSession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        stage: stage.parse().unwrap_or_default(),
        goal: ChatGoal {
            goal_type: row.get(4)?,
            goal_cost: row.get(5)?,
            monthly_saving: row.get(6)?,
            timeline: row.get(7)?,
            products: products.and_then(|p| serde_json::from_str(&p).ok()),
        },
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

impl Database {
    /// Find a user's session by its public id
    pub fn get_chat_session(&self, user_id: i64, session_id: &str) -> Result<Option<ChatSession>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                &format!(
                    "SELECT {} FROM chat_sessions WHERE user_id = ? AND session_id = ?",
                    SESSION_COLUMNS
                ),
                params![user_id, session_id],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    /// Load a session or start a new one at the discovery stage
    pub fn get_or_create_chat_session(&self, user_id: i64, session_id: &str) -> Result<ChatSession> {
        {
            let conn = self.conn()?;
            conn.execute(
                r#"
                INSERT INTO chat_sessions (user_id, session_id, stage)
                VALUES (?, ?, ?)
                ON CONFLICT(user_id, session_id) DO NOTHING
                "#,
                params![user_id, session_id, ChatStage::Discovery.as_str()],
            )?;
        }

        self.get_chat_session(user_id, session_id)?
            .ok_or_else(|| Error::NotFound(format!("chat session {}", session_id)))
    }

    /// Persist stage and goal fields
    pub fn save_chat_session(&self, session: &ChatSession) -> Result<()> {
        let products = session
            .goal
            .products
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE chat_sessions
            SET stage = ?, goal_type = ?, goal_cost = ?, monthly_saving = ?, timeline = ?,
                products = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![
                session.stage.as_str(),
                session.goal.goal_type,
                session.goal.goal_cost,
                session.goal.monthly_saving,
                session.goal.timeline,
                products,
                session.id,
            ],
        )?;

        debug!(session = %session.session_id, stage = %session.stage, "Chat session saved");
        Ok(())
    }

    /// Delete a user's session and its history
    pub fn delete_chat_session(&self, user_id: i64, session_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let affected = conn.execute(
            "DELETE FROM chat_sessions WHERE user_id = ? AND session_id = ?",
            params![user_id, session_id],
        )?;
        Ok(affected > 0)
    }

    /// Record one turn of a conversation
    pub fn append_chat_message(&self, chat_session_id: i64, role: &str, content: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chat_messages (chat_session_id, role, content) VALUES (?, ?, ?)",
            params![chat_session_id, role, content],
        )?;
        Ok(())
    }

    /// The latest `limit` turns, oldest first
    pub fn recent_chat_messages(&self, chat_session_id: i64, limit: i64) -> Result<Vec<ChatRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT role, content, created_at FROM (
                SELECT id, role, content, created_at
                FROM chat_messages
                WHERE chat_session_id = ?
                ORDER BY id DESC
                LIMIT ?
            ) ORDER BY id ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![chat_session_id, limit], |row| {
                let created_at: String = row.get(2)?;
                Ok(ChatRecord {
                    role: row.get(0)?,
                    content: row.get(1)?,
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
