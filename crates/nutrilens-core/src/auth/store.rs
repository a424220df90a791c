//! Durable storage for the single `authToken` slot.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;

/// Name of the persisted slot (file name / keyring user).
pub const TOKEN_SLOT: &str = "authToken";

/// Keyring service name.
const SERVICE_NAME: &str = "nutrilens";

/// A single named slot holding the raw token string.
pub trait TokenStore: Send + Sync {
    /// Read the slot. `Ok(None)` when nothing is stored.
    fn load(&self) -> Result<Option<String>>;

    /// Overwrite the slot.
    fn save(&self, token: &str) -> Result<()>;

    /// Erase the slot. Erasing an empty slot is not an error.
    fn clear(&self) -> Result<()>;
}

/// Token kept in a plain file under the cache directory.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join(TOKEN_SLOT),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read token file")?;
        let token = contents.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create token directory")?;
        }
        std::fs::write(&self.path, token).context("Failed to write token file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove token file")?;
        }
        Ok(())
    }
}

/// Token kept in the OS keychain.
pub struct KeyringTokenStore {
    user: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self {
            user: TOKEN_SLOT.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &self.user).context("Failed to create keyring entry")
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

/// Process-local slot; nothing survives the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a token already in the slot.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }

    /// Peek at the slot without going through the trait.
    pub fn get(&self) -> Option<String> {
        self.slot.lock().map(|s| s.clone()).unwrap_or(None)
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.get())
    }

    fn save(&self, token: &str) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("Token slot lock poisoned"))?;
        *slot = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow::anyhow!("Token slot lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_lifecycle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTokenStore::new(dir.path().join("nested"));

        assert_eq!(store.load().expect("load"), None);
        // Clearing an empty slot is fine.
        store.clear().expect("clear empty");

        store.save("abc.def.ghi").expect("save");
        assert!(store.path().ends_with(TOKEN_SLOT));
        assert_eq!(store.load().expect("load"), Some("abc.def.ghi".to_string()));

        store.save("second").expect("overwrite");
        assert_eq!(store.load().expect("load"), Some("second".to_string()));

        store.clear().expect("clear");
        assert_eq!(store.load().expect("load"), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_store_ignores_blank_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTokenStore::new(dir.path().to_path_buf());
        std::fs::write(store.path(), "  \n").expect("write");
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::with_token("t");
        assert_eq!(store.load().expect("load"), Some("t".to_string()));
        store.clear().expect("clear");
        assert_eq!(store.get(), None);
        store.save("u").expect("save");
        assert_eq!(store.get(), Some("u".to_string()));
    }
}
