use std::sync::Arc;

use crate::store::{ConfigStore, FileStore};

/// Endpoints for the Google OAuth and YouTube Data APIs.
///
/// Carried as a value on [`AppState`] rather than hardcoded at the call
/// sites so tests can point every operation at a local fixture server.
#[derive(Clone, Debug)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
    pub upload_base: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            api_base: "https://www.googleapis.com".to_string(),
            upload_base: "https://www.googleapis.com".to_string(),
        }
    }
}

impl GoogleEndpoints {
    /// Point every endpoint at one base URL (a local fixture server).
    pub fn with_base(base: &str) -> Self {
        Self {
            auth_url: format!("{base}/o/oauth2/auth"),
            token_url: format!("{base}/token"),
            api_base: base.to_string(),
            upload_base: base.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ConfigStore>,
    pub client: reqwest::Client,
    pub endpoints: GoogleEndpoints,
    pub domain: String,
    pub protocol: String,
}

impl AppState {
    pub fn from_env() -> color_eyre::Result<Self> {
        let store_path =
            std::env::var("STORE_PATH").unwrap_or_else(|_| "streamsched.json".to_string());
        let store = FileStore::open(store_path)?;

        let client = reqwest::ClientBuilder::new().use_rustls_tls().build()?;

        Ok(Self {
            store: Arc::new(store),
            client,
            endpoints: GoogleEndpoints::default(),
            domain: std::env::var("DOMAIN").unwrap_or_else(|_| "localhost:3000".to_string()),
            protocol: std::env::var("PROTO").unwrap_or_else(|_| "http".to_string()),
        })
    }

    /// Absolute redirect URI Google sends the browser back to after the
    /// user authorizes. The user id rides in the path so the callback
    /// handler never relies on ambient identity.
    pub fn redirect_uri(&self, user_id: &str) -> String {
        format!(
            "{}://{}/oauth/google/callback/{}",
            self.protocol, self.domain, user_id
        )
    }

    /// Where the callback sends the browser regardless of outcome.
    pub fn settings_url(&self) -> String {
        "/settings/user".to_string()
    }
}
