//! SQLite-backed session store

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::{AgentError, AgentResult};
use crate::llm::Message;

use super::metadata::SessionMetadata;
use super::store::SessionStore;

const SCHEMA_VERSION: i32 = 1;

/// Sessions and messages in two tables; message order is the `seq` column
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    location: Option<PathBuf>,
}

impl SqliteSessionStore {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> AgentResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> AgentResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, location: Option<PathBuf>) -> AgentResult<Self> {
        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version < 1 {
            migrate_v1(&conn)?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    fn conn(&self) -> AgentResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AgentError::other("session database lock poisoned"))
    }
}

fn migrate_v1(conn: &Connection) -> AgentResult<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT PRIMARY KEY,
            model TEXT NOT NULL DEFAULT '',
            provider TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            role TEXT NOT NULL,
            body TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, seq);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("[SqliteSessionStore] Migrated to schema v{}", SCHEMA_VERSION);
    Ok(())
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn read_metadata(conn: &Connection, session_id: &str) -> AgentResult<Option<SessionMetadata>> {
    let meta = conn
        .query_row(
            "SELECT session_id, model, provider, created_at, updated_at
             FROM sessions WHERE session_id = ?1",
            [session_id],
            |row| {
                Ok(SessionMetadata {
                    session_id: row.get(0)?,
                    model: row.get(1)?,
                    provider: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                    updated_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()?;
    Ok(meta)
}

impl SessionStore for SqliteSessionStore {
    fn ensure_session(&self, metadata: &SessionMetadata) -> AgentResult<SessionMetadata> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO sessions (session_id, model, provider, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id) DO UPDATE SET model = excluded.model, provider = excluded.provider",
            params![
                metadata.session_id,
                metadata.model,
                metadata.provider,
                metadata.created_at.to_rfc3339(),
                metadata.updated_at.to_rfc3339(),
            ],
        )?;

        read_metadata(&conn, &metadata.session_id)?
            .ok_or_else(|| AgentError::SessionNotFound(metadata.session_id.clone()))
    }

    fn load(&self, session_id: &str) -> AgentResult<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT body FROM messages WHERE session_id = ?1 ORDER BY seq ASC")?;

        let bodies = stmt
            .query_map([session_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(AgentError::from))
            .collect()
    }

    fn append(&self, session_id: &str, message: &Message) -> AgentResult<()> {
        let body = serde_json::to_string(message)?;
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO messages (session_id, role, body) VALUES (?1, ?2, ?3)",
            params![session_id, message.role.as_str(), body],
        )?;
        conn.execute(
            "UPDATE sessions SET updated_at = ?2 WHERE session_id = ?1",
            params![session_id, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    fn load_metadata(&self, session_id: &str) -> AgentResult<SessionMetadata> {
        let conn = self.conn()?;
        read_metadata(&conn, session_id)?
            .ok_or_else(|| AgentError::SessionNotFound(session_id.to_string()))
    }

    fn describe(&self) -> String {
        match &self.location {
            Some(path) => format!("sqlite store at {}", path.display()),
            None => "sqlite in-memory store".to_string(),
        }
    }
}
