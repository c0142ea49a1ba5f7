//! Session store trait and backend selection

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::{AgentError, AgentResult};
use crate::llm::Message;

use super::metadata::SessionMetadata;
use super::sqlite::SqliteSessionStore;
use super::storage::FileSessionStore;

/// Durable, append-only transcript storage keyed by session id.
///
/// Implementations must return messages in the order they were appended and
/// must never drop or rewrite a stored message.
pub trait SessionStore: Send + Sync {
    /// Create the session if it does not exist yet and return its metadata.
    ///
    /// For an existing session the stored creation time is kept and the
    /// model/provider fields are refreshed from `metadata`.
    fn ensure_session(&self, metadata: &SessionMetadata) -> AgentResult<SessionMetadata>;

    /// Load the full transcript of a session (empty for unknown ids)
    fn load(&self, session_id: &str) -> AgentResult<Vec<Message>>;

    /// Append one message to a session
    fn append(&self, session_id: &str, message: &Message) -> AgentResult<()>;

    /// Load metadata for a session
    fn load_metadata(&self, session_id: &str) -> AgentResult<SessionMetadata>;

    /// Short backend description for logs
    fn describe(&self) -> String;
}

/// Open a store from a connection string.
///
/// - `sqlite::memory:` - in-memory SQLite database
/// - `sqlite://<path>` - SQLite database file
/// - `file://<dir>` or a bare path - one directory per session
pub fn connect(conn_str: &str) -> AgentResult<Arc<dyn SessionStore>> {
    let conn_str = conn_str.trim();
    if conn_str.is_empty() {
        return Err(AgentError::Config("session store location is empty".to_string()));
    }

    let store: Arc<dyn SessionStore> = if conn_str == "sqlite::memory:" {
        Arc::new(SqliteSessionStore::open_in_memory()?)
    } else if let Some(path) = conn_str.strip_prefix("sqlite://") {
        Arc::new(SqliteSessionStore::open(path)?)
    } else if let Some(dir) = conn_str.strip_prefix("file://") {
        Arc::new(FileSessionStore::with_dir(PathBuf::from(dir)))
    } else if conn_str.contains("://") {
        return Err(AgentError::Config(format!(
            "unsupported session store scheme: {}",
            conn_str
        )));
    } else {
        Arc::new(FileSessionStore::with_dir(PathBuf::from(conn_str)))
    };

    tracing::info!("[SessionStore] Using {}", store.describe());
    Ok(store)
}
