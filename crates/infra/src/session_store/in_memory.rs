use std::sync::Mutex;

use edugate_auth::{SessionError, SessionRecord, SessionStorage};

/// Process-local session slot. Lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySessionStorage {
    slot: Mutex<Option<SessionRecord>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> SessionError {
        SessionError::Storage("session slot lock poisoned".to_string())
    }
}

impl SessionStorage for InMemorySessionStorage {
    fn load(&self) -> Result<Option<SessionRecord>, SessionError> {
        let slot = self.slot.lock().map_err(|_| Self::poisoned())?;
        Ok(slot.clone())
    }

    fn save(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let mut slot = self.slot.lock().map_err(|_| Self::poisoned())?;
        *slot = Some(record.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        let mut slot = self.slot.lock().map_err(|_| Self::poisoned())?;
        *slot = None;
        Ok(())
    }
}
