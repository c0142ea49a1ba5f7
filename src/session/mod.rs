//! Session management
//!
//! Transcripts are persisted per session id through a [`SessionStore`]:
//! - `FileSessionStore` - `metadata.json` + `history.jsonl` per session directory
//! - `SqliteSessionStore` - `sessions` and `messages` tables
//!
//! [`connect`] picks the backend from a connection string.

mod metadata;
mod session;
mod sqlite;
mod storage;
mod store;
mod window;

pub use metadata::SessionMetadata;
pub use session::ConversationSession;
pub use sqlite::SqliteSessionStore;
pub use storage::{FileSessionStore, SESSIONS_DIR};
pub use store::{connect, SessionStore};
pub use window::HistoryWindow;
