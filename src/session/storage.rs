//! File-backed session store
//!
//! Layout: `<base_dir>/<session_id>/metadata.json` plus an append-only
//! `history.jsonl` with one serialized message per line.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::core::{AgentError, AgentResult};
use crate::llm::Message;

use super::metadata::SessionMetadata;
use super::store::SessionStore;

/// Default directory for session storage
pub const SESSIONS_DIR: &str = "sessions";

/// Directory-per-session storage
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    base_dir: PathBuf,
}

impl FileSessionStore {
    /// Create a new session storage with the default directory
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from(SESSIONS_DIR),
        }
    }

    /// Create a new session storage with a custom directory
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: dir.into(),
        }
    }

    /// Get the directory path for a session
    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(session_id)
    }

    /// Get the metadata file path for a session
    pub fn metadata_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("metadata.json")
    }

    /// Get the history file path for a session
    pub fn history_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("history.jsonl")
    }

    /// Create the session directory if it doesn't exist
    fn ensure_session_dir(&self, session_id: &str) -> AgentResult<PathBuf> {
        validate_session_id(session_id)?;
        let dir = self.session_dir(session_id);
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    fn save_metadata(&self, metadata: &SessionMetadata) -> AgentResult<()> {
        self.ensure_session_dir(&metadata.session_id)?;
        let path = self.metadata_path(&metadata.session_id);

        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, metadata)?;
        writer.flush()?;

        Ok(())
    }

    /// Check if a session exists
    pub fn session_exists(&self, session_id: &str) -> bool {
        self.metadata_path(session_id).exists()
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Default for FileSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Session ids become directory names, so path separators are refused
fn validate_session_id(session_id: &str) -> AgentResult<()> {
    if session_id.is_empty()
        || session_id == "."
        || session_id == ".."
        || session_id.contains(['/', '\\'])
    {
        return Err(AgentError::Config(format!(
            "invalid session id for file store: {:?}",
            session_id
        )));
    }
    Ok(())
}

impl SessionStore for FileSessionStore {
    fn ensure_session(&self, metadata: &SessionMetadata) -> AgentResult<SessionMetadata> {
        let merged = match self.load_metadata(&metadata.session_id) {
            Ok(mut existing) => {
                existing.model = metadata.model.clone();
                existing.provider = metadata.provider.clone();
                existing
            }
            Err(AgentError::SessionNotFound(_)) => {
                tracing::info!("[FileSessionStore] Creating session {}", metadata.session_id);
                metadata.clone()
            }
            Err(e) => return Err(e),
        };

        self.save_metadata(&merged)?;
        Ok(merged)
    }

    fn load(&self, session_id: &str) -> AgentResult<Vec<Message>> {
        let path = self.history_path(session_id);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path)?;
        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<std::io::Result<_>>()?;
        let last = lines.iter().rposition(|l| !l.trim().is_empty());
        let mut messages = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(message) => messages.push(message),
                // A crash mid-append leaves a partial last line
                Err(e) if Some(i) == last => {
                    tracing::warn!(
                        "[SessionStore] Skipping torn last line of {}: {}",
                        path.display(),
                        e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(messages)
    }

    fn append(&self, session_id: &str, message: &Message) -> AgentResult<()> {
        self.ensure_session_dir(session_id)?;
        let path = self.history_path(session_id);
        if path.exists() {
            drop_torn_tail(&path)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        let json = serde_json::to_string(message)?;
        writeln!(file, "{}", json)?;
        file.sync_data()?;

        if let Ok(mut metadata) = self.load_metadata(session_id) {
            metadata.touch();
            self.save_metadata(&metadata)?;
        }

        Ok(())
    }

    fn load_metadata(&self, session_id: &str) -> AgentResult<SessionMetadata> {
        let path = self.metadata_path(session_id);

        if !path.exists() {
            return Err(AgentError::SessionNotFound(session_id.to_string()));
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let metadata: SessionMetadata = serde_json::from_reader(reader)?;

        Ok(metadata)
    }

    fn describe(&self) -> String {
        format!("file store at {}", self.base_dir.display())
    }
}

/// Cut a partial last line left by an interrupted append, so the next
/// message starts on its own line
fn drop_torn_tail(path: &Path) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new().read(true).write(true).open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(());
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut contents = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut contents)?;
    let keep = contents
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |i| i + 1);

    tracing::warn!(
        "[SessionStore] Dropping {} bytes of torn history in {}",
        contents.len() - keep,
        path.display()
    );
    file.set_len(keep as u64)?;
    file.sync_data()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (FileSessionStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSessionStore::with_dir(temp_dir.path());
        (storage, temp_dir)
    }

    #[test]
    fn test_ensure_session_creates_and_keeps_created_at() {
        let (storage, _temp) = create_test_storage();

        let meta = SessionMetadata::new("3").with_model("gemini-2.0-flash", "gemini");
        let created = storage.ensure_session(&meta).unwrap();
        assert!(storage.session_exists("3"));

        let again = SessionMetadata::new("3").with_model("gemini-2.5-pro", "gemini");
        let reopened = storage.ensure_session(&again).unwrap();
        assert_eq!(reopened.created_at, created.created_at);
        assert_eq!(reopened.model, "gemini-2.5-pro");
    }

    #[test]
    fn test_append_load_messages() {
        let (storage, _temp) = create_test_storage();

        storage.append("test_session", &Message::user("Hello")).unwrap();
        storage.append("test_session", &Message::assistant("Hi there")).unwrap();

        let messages = storage.load("test_session").unwrap();
        assert_eq!(messages, vec![Message::user("Hello"), Message::assistant("Hi there")]);
    }

    #[test]
    fn test_unknown_session_is_empty() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.load("nobody").unwrap().is_empty());
        assert!(matches!(
            storage.load_metadata("nobody"),
            Err(AgentError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_survives_reopen() {
        let (storage, temp) = create_test_storage();
        storage.ensure_session(&SessionMetadata::new("3")).unwrap();
        storage.append("3", &Message::user("remember me")).unwrap();
        drop(storage);

        let reopened = FileSessionStore::with_dir(temp.path());
        assert_eq!(reopened.load("3").unwrap(), vec![Message::user("remember me")]);
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let (storage, _temp) = create_test_storage();
        assert!(storage.append("../escape", &Message::user("x")).is_err());
        assert!(storage.ensure_session(&SessionMetadata::new("a/b")).is_err());
    }

    #[test]
    fn test_torn_last_line_is_skipped_and_repaired() {
        let (storage, _temp) = create_test_storage();
        storage.append("3", &Message::user("hello")).unwrap();
        storage.append("3", &Message::assistant("hi")).unwrap();

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(storage.history_path("3"))
            .unwrap();
        write!(file, "{{\"role\":\"us").unwrap();
        drop(file);

        assert_eq!(
            storage.load("3").unwrap(),
            vec![Message::user("hello"), Message::assistant("hi")]
        );

        storage.append("3", &Message::user("again")).unwrap();
        assert_eq!(
            storage.load("3").unwrap(),
            vec![
                Message::user("hello"),
                Message::assistant("hi"),
                Message::user("again")
            ]
        );
    }

    #[test]
    fn test_corrupt_middle_line_is_an_error() {
        let (storage, _temp) = create_test_storage();
        fs::create_dir_all(storage.session_dir("3")).unwrap();
        let good = serde_json::to_string(&Message::user("ok")).unwrap();
        fs::write(storage.history_path("3"), format!("not json\n{}\n", good)).unwrap();

        assert!(storage.load("3").is_err());
    }
}
