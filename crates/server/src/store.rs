//! SQLite-backed storage of chat turns, keyed by session and user.

use chrono::{DateTime, Utc};
use docchat_core::{AppError, AppResult};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

/// One user/assistant exchange within a session.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub session_id: String,
    pub username: String,
    pub user_prompt: String,
    pub assistant_response: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub created_at: DateTime<Utc>,
}

/// Summary of a session: its id and the first message sent.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub first_message: String,
}

/// Token totals accumulated over a session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Chat-session persistence.
pub struct SessionStore {
    conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open (and initialize) the store at the given path.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Session(format!("Failed to create session directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Session(format!("Failed to open session database: {}", e)))?;

        Self::init(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Session(format!("Failed to open session database: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chat_turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                username TEXT NOT NULL,
                user_prompt TEXT NOT NULL,
                assistant_response TEXT NOT NULL,
                prompt_tokens INTEGER NOT NULL DEFAULT 0,
                completion_tokens INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_turns_session
                ON chat_turns(username, session_id);
            "#,
        )
        .map_err(|e| AppError::Session(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Initialized session store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a turn to its session.
    pub fn append_turn(&self, turn: &ChatTurn) -> AppResult<()> {
        self.lock()
            .execute(
                "INSERT INTO chat_turns
                 (session_id, username, user_prompt, assistant_response,
                  prompt_tokens, completion_tokens, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    turn.session_id,
                    turn.username,
                    turn.user_prompt,
                    turn.assistant_response,
                    turn.prompt_tokens as i64,
                    turn.completion_tokens as i64,
                    turn.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| AppError::Session(format!("Failed to insert turn: {}", e)))?;

        Ok(())
    }

    /// Sessions belonging to a user, each with its opening message, oldest
    /// session first.
    pub fn sessions_for_user(&self, username: &str) -> AppResult<Vec<SessionSummary>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT session_id,
                        (SELECT user_prompt FROM chat_turns t2
                          WHERE t2.session_id = t1.session_id
                            AND t2.username = t1.username
                          ORDER BY t2.id LIMIT 1)
                 FROM chat_turns t1
                 WHERE username = ?1
                 GROUP BY session_id
                 ORDER BY MIN(id)",
            )
            .map_err(|e| AppError::Session(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![username], |row| {
                Ok(SessionSummary {
                    session_id: row.get(0)?,
                    first_message: row.get(1)?,
                })
            })
            .map_err(|e| AppError::Session(format!("Failed to query sessions: {}", e)))?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions
                .push(row.map_err(|e| AppError::Session(format!("Failed to read row: {}", e)))?);
        }
        Ok(sessions)
    }

    /// All turns of a session in order.
    pub fn turns_for_session(
        &self,
        username: &str,
        session_id: &str,
    ) -> AppResult<Vec<ChatTurn>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT session_id, username, user_prompt, assistant_response,
                        prompt_tokens, completion_tokens, created_at
                 FROM chat_turns
                 WHERE username = ?1 AND session_id = ?2
                 ORDER BY id",
            )
            .map_err(|e| AppError::Session(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![username, session_id], |row| {
                let created_at: String = row.get(6)?;
                Ok(ChatTurn {
                    session_id: row.get(0)?,
                    username: row.get(1)?,
                    user_prompt: row.get(2)?,
                    assistant_response: row.get(3)?,
                    prompt_tokens: row.get::<_, i64>(4)? as u32,
                    completion_tokens: row.get::<_, i64>(5)? as u32,
                    created_at: created_at
                        .parse::<DateTime<Utc>>()
                        .unwrap_or_else(|_| Utc::now()),
                })
            })
            .map_err(|e| AppError::Session(format!("Failed to query turns: {}", e)))?;

        let mut turns = Vec::new();
        for row in rows {
            turns.push(row.map_err(|e| AppError::Session(format!("Failed to read row: {}", e)))?);
        }
        Ok(turns)
    }

    /// The most recent `limit` turns of a session, oldest of them first.
    pub fn recent_turns(
        &self,
        username: &str,
        session_id: &str,
        limit: usize,
    ) -> AppResult<Vec<ChatTurn>> {
        let mut turns = self.turns_for_session(username, session_id)?;
        if turns.len() > limit {
            turns.drain(..turns.len() - limit);
        }
        Ok(turns)
    }

    /// Delete a session's turns. Returns whether anything was removed.
    pub fn delete_session(&self, username: &str, session_id: &str) -> AppResult<bool> {
        let deleted = self
            .lock()
            .execute(
                "DELETE FROM chat_turns WHERE username = ?1 AND session_id = ?2",
                params![username, session_id],
            )
            .map_err(|e| AppError::Session(format!("Failed to delete session: {}", e)))?;

        Ok(deleted > 0)
    }

    /// Token totals accumulated over a session.
    pub fn token_usage(&self, username: &str, session_id: &str) -> AppResult<TokenTotals> {
        let conn = self.lock();
        let (prompt_tokens, completion_tokens): (i64, i64) = conn
            .query_row(
                "SELECT COALESCE(SUM(prompt_tokens), 0),
                        COALESCE(SUM(completion_tokens), 0)
                 FROM chat_turns
                 WHERE username = ?1 AND session_id = ?2",
                params![username, session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| AppError::Session(format!("Failed to sum token usage: {}", e)))?;

        Ok(TokenTotals {
            prompt_tokens: prompt_tokens as u64,
            completion_tokens: completion_tokens as u64,
            total_tokens: (prompt_tokens + completion_tokens) as u64,
        })
    }
}
