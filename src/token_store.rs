//! Durable storage for the access/refresh token pair
//!
//! Storage is plain indirection: no validation and no network. Both slots are
//! always written together.

use crate::error::Result;
use papaya::HashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const ACCESS_TOKEN_SLOT: &str = "access_token";
const REFRESH_TOKEN_SLOT: &str = "refresh_token";

/// Persisted token slots. Absent tokens read back as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTokens {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

impl StoredTokens {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty() && self.refresh_token.is_empty()
    }
}

/// Backend that keeps tokens across process restarts
pub trait TokenStorage: Send + Sync + 'static {
    /// Read persisted tokens (missing -> empty strings)
    fn load(&self) -> Result<StoredTokens>;

    /// Persist both tokens together
    fn save(&self, access_token: &str, refresh_token: &str) -> Result<()>;

    /// Remove both tokens. Clearing empty storage is not an error.
    fn clear(&self) -> Result<()>;
}

/// Thread-safe in-memory storage using Papaya HashMap
#[derive(Clone)]
pub struct MemoryTokenStorage {
    slots: Arc<HashMap<&'static str, String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(HashMap::new()),
        }
    }
}

impl Default for MemoryTokenStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<StoredTokens> {
        let slots = self.slots.pin();
        Ok(StoredTokens {
            access_token: slots.get(ACCESS_TOKEN_SLOT).cloned().unwrap_or_default(),
            refresh_token: slots.get(REFRESH_TOKEN_SLOT).cloned().unwrap_or_default(),
        })
    }

    fn save(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        let slots = self.slots.pin();
        slots.insert(ACCESS_TOKEN_SLOT, access_token.to_string());
        slots.insert(REFRESH_TOKEN_SLOT, refresh_token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.slots.pin().clear();
        Ok(())
    }
}

/// JSON file storage
///
/// `save` writes a sibling temp file and renames it into place, so a reader
/// sees either the old pair or the new pair.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<StoredTokens> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredTokens::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        let tokens = StoredTokens {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        std::fs::write(&temp, serde_json::to_vec(&tokens)?)?;
        std::fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
