//! Session persistence seam.
//!
//! The notification core only reads the current identity; the login and
//! logout flows write it. The record is trusted until explicitly cleared,
//! and a corrupt record reads as absent at the call sites that only need
//! an optional identity.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use crate::identity::Identity;

/// Session store error type.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt session record: {0}")]
    Corrupt(String),
}

/// Storage seam for the authenticated identity.
pub trait SessionStore: Send + Sync {
    /// Read the current identity, if one is persisted.
    fn load(&self) -> Result<Option<Identity>, SessionError>;

    /// Persist the identity after login.
    fn store(&self, identity: &Identity) -> Result<(), SessionError>;

    /// Remove the persisted identity at logout.
    fn clear(&self) -> Result<(), SessionError>;
}

/// File-backed store holding one JSON identity record.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Identity>, SessionError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        let identity = serde_json::from_str(&raw)
            .map_err(|error| SessionError::Corrupt(error.to_string()))?;
        Ok(Some(identity))
    }

    fn store(&self, identity: &Identity) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crashed write never leaves a torn record.
        let staged = self.path.with_extension("tmp");
        let encoded = serde_json::to_string_pretty(identity)
            .map_err(|error| SessionError::Corrupt(error.to_string()))?;
        std::fs::write(&staged, encoded)?;
        std::fs::rename(&staged, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

/// In-memory store for tests and embedders that manage persistence
/// themselves.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Identity>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: Identity) -> Self {
        Self {
            inner: Mutex::new(Some(identity)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Identity>, SessionError> {
        let guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.clone())
    }

    fn store(&self, identity: &Identity) -> Result<(), SessionError> {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(identity.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
        Ok(())
    }
}
