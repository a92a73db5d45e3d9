use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use edugate_auth::{SessionError, SessionRecord, SessionStorage};

use super::storage_error;

pub const SESSION_FILE_ENV: &str = "EDUGATE_SESSION_FILE";

const DEFAULT_SESSION_FILE: &str = "edugate-session.json";
const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SessionDocument {
    version: u32,
    session: SessionRecord,
}

/// Session slot persisted as one JSON document, so a signed-in context
/// survives a process restart.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use `EDUGATE_SESSION_FILE`, falling back to a file in the temp dir.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(SESSION_FILE_ENV).filter(|p| !p.trim().is_empty()) {
            Some(path) => Self::new(path.trim()),
            None => {
                let path = std::env::temp_dir().join(DEFAULT_SESSION_FILE);
                tracing::warn!(
                    path = %path.display(),
                    "{} not set; using default session file",
                    SESSION_FILE_ENV
                );
                Self::new(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> anyhow::Result<Option<SessionRecord>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()));
            }
        };

        let document: SessionDocument = serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        if document.version != DOCUMENT_VERSION {
            bail!(
                "unsupported session document version {} in {}",
                document.version,
                self.path.display()
            );
        }
        Ok(Some(document.session))
    }

    fn write(&self, record: &SessionRecord) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let document = SessionDocument {
            version: DOCUMENT_VERSION,
            session: record.clone(),
        };
        let json = serde_json::to_vec_pretty(&document).context("encoding session document")?;

        // Write then rename so readers never observe a half-written file.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).with_context(|| format!("writing {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    fn remove(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", self.path.display())),
        }
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<SessionRecord>, SessionError> {
        self.read().map_err(storage_error)
    }

    fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        self.write(record).map_err(storage_error)?;
        tracing::debug!(user_id = %record.user_id, path = %self.path.display(), "session persisted");
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        self.remove().map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use edugate_core::UserId;

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("edugate-{}", uuid::Uuid::now_v7()))
            .join(name)
    }

    fn record() -> SessionRecord {
        SessionRecord {
            user_id: UserId::new(),
            issued_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_else(Utc::now),
        }
    }

    #[test]
    fn missing_file_is_no_session() {
        let storage = FileSessionStorage::new(scratch("session.json"));
        assert_eq!(storage.load().unwrap(), None);
        storage.clear().unwrap();
    }

    #[test]
    fn survives_a_new_adapter_instance() {
        let path = scratch("session.json");
        let record = record();
        FileSessionStorage::new(&path).save(&record).unwrap();

        let reopened = FileSessionStorage::new(&path);
        assert_eq!(reopened.load().unwrap(), Some(record));
        assert!(!path.with_extension("json.tmp").exists());

        reopened.clear().unwrap();
        assert_eq!(reopened.load().unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_document_is_a_storage_error() {
        let path = scratch("session.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let err = FileSessionStorage::new(&path).load().unwrap_err();
        match err {
            SessionError::Storage(msg) => assert!(msg.contains("parsing")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_document_version_is_rejected() {
        let path = scratch("session.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let json = serde_json::json!({ "version": 99, "session": record() });
        fs::write(&path, json.to_string()).unwrap();

        let err = FileSessionStorage::new(&path).load().unwrap_err();
        assert!(matches!(err, SessionError::Storage(msg) if msg.contains("version 99")));
    }

    #[test]
    fn path_from_lookup() {
        let storage = FileSessionStorage::from_lookup(|key| {
            (key == SESSION_FILE_ENV).then(|| " /var/lib/edugate/session.json ".to_string())
        });
        assert_eq!(storage.path(), Path::new("/var/lib/edugate/session.json"));

        let fallback = FileSessionStorage::from_lookup(|_| None);
        assert!(fallback.path().ends_with(DEFAULT_SESSION_FILE));
    }
}
