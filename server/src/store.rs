use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Namespace under which every streamsched key lives.
pub const APP_ID: &str = "streamsched";

// App-wide keys, set once by an administrator.
pub const KEY_CLIENT_ID: &str = "youtube_client_id";
pub const KEY_CLIENT_SECRET: &str = "youtube_client_secret";
pub const KEY_API_KEY: &str = "youtube_api_key";

// Per-user keys.
pub const KEY_OAUTH_STATE: &str = "youtube_oauth_state";
pub const KEY_USER_SCOPES: &str = "user_scopes";
pub const KEY_ACCESS_TOKEN: &str = "google_token";
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";

/// Key-value configuration storage scoped by (owner, namespace, key).
///
/// Missing keys read as the empty string. There is no transactional
/// guarantee across keys; callers that need a pair of keys to stay
/// consistent issue both writes consecutively.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_app_value(&self, namespace: &str, key: &str) -> Result<String>;
    async fn set_app_value(&self, namespace: &str, key: &str, value: &str) -> Result<()>;
    async fn get_user_value(&self, owner: &str, namespace: &str, key: &str) -> Result<String>;
    async fn set_user_value(&self, owner: &str, namespace: &str, key: &str, value: &str)
        -> Result<()>;
}

type Namespaced = HashMap<String, HashMap<String, String>>;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    app: Namespaced,
    #[serde(default)]
    users: HashMap<String, Namespaced>,
}

impl StoreDocument {
    fn get_app(&self, namespace: &str, key: &str) -> String {
        self.app
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned()
            .unwrap_or_default()
    }

    fn set_app(&mut self, namespace: &str, key: &str, value: &str) {
        self.app
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    fn get_user(&self, owner: &str, namespace: &str, key: &str) -> String {
        self.users
            .get(owner)
            .and_then(|namespaces| namespaces.get(namespace))
            .and_then(|ns| ns.get(key))
            .cloned()
            .unwrap_or_default()
    }

    fn set_user(&mut self, owner: &str, namespace: &str, key: &str, value: &str) {
        self.users
            .entry(owner.to_string())
            .or_default()
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }
}

/// JSON-file-backed store. The document is held in memory and rewritten to
/// disk on every set; fine for the handful of keys this app keeps.
pub struct FileStore {
    path: PathBuf,
    doc: Mutex<StoreDocument>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                Error::Store(format!("failed to read {}: {e}", path.display()))
            })?;
            serde_json::from_str(&contents).map_err(|e| {
                Error::Store(format!("malformed store file {}: {e}", path.display()))
            })?
        } else {
            StoreDocument::default()
        };

        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    fn persist(&self, doc: &StoreDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(doc)?;
        std::fs::write(&self.path, json)
            .map_err(|e| Error::Store(format!("failed to write {}: {e}", self.path.display())))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreDocument> {
        // A poisoned lock means a writer panicked mid-update; the in-memory
        // document is still a plain map, so keep going with it.
        self.doc.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ConfigStore for FileStore {
    async fn get_app_value(&self, namespace: &str, key: &str) -> Result<String> {
        Ok(self.lock().get_app(namespace, key))
    }

    async fn set_app_value(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let mut doc = self.lock();
        doc.set_app(namespace, key, value);
        self.persist(&doc)
    }

    async fn get_user_value(&self, owner: &str, namespace: &str, key: &str) -> Result<String> {
        Ok(self.lock().get_user(owner, namespace, key))
    }

    async fn set_user_value(
        &self,
        owner: &str,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let mut doc = self.lock();
        doc.set_user(owner, namespace, key, value);
        self.persist(&doc)
    }
}

/// In-memory store used by tests.
#[derive(Default)]
pub struct MemoryStore {
    doc: Mutex<StoreDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreDocument> {
        self.doc.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get_app_value(&self, namespace: &str, key: &str) -> Result<String> {
        Ok(self.lock().get_app(namespace, key))
    }

    async fn set_app_value(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        self.lock().set_app(namespace, key, value);
        Ok(())
    }

    async fn get_user_value(&self, owner: &str, namespace: &str, key: &str) -> Result<String> {
        Ok(self.lock().get_user(owner, namespace, key))
    }

    async fn set_user_value(
        &self,
        owner: &str,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        self.lock().set_user(owner, namespace, key, value);
        Ok(())
    }
}
