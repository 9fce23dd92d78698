//! OAuth2 authorization-code flow against Google.
//!
//! Builds authorization URLs with a per-user anti-forgery state nonce and
//! exchanges callback codes for an access/refresh token pair.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::state::AppState;
use crate::store::{
    APP_ID, KEY_ACCESS_TOKEN, KEY_CLIENT_ID, KEY_CLIENT_SECRET, KEY_OAUTH_STATE,
    KEY_REFRESH_TOKEN, KEY_USER_SCOPES,
};

/// The canonical scope that gates the `can_access_youtube` capability.
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";
pub const YOUTUBE_FORCE_SSL_SCOPE: &str = "https://www.googleapis.com/auth/youtube.force-ssl";
pub const YOUTUBE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";

/// Scopes requested on every authorization attempt.
const REQUESTED_SCOPES: [&str; 3] = [
    YOUTUBE_SCOPE,
    YOUTUBE_FORCE_SSL_SCOPE,
    YOUTUBE_READONLY_SCOPE,
];

#[derive(Serialize)]
struct AuthUrlParams<'a> {
    client_id: &'a str,
    scope: String,
    redirect_uri: String,
    response_type: &'static str,
    // Offline access forces Google to issue a refresh token; prompt=consent
    // makes it reissue one even on repeat authorizations.
    access_type: &'static str,
    prompt: &'static str,
    state: &'a str,
}

/// Raw token endpoint response. Both token fields are optional so an
/// incomplete grant can be detected and rejected instead of half-stored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenResponse {
    fn error_message(&self, fallback: &str) -> String {
        self.error_description
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Per-user capability flags derived from the scopes the user granted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScopeFlags {
    pub can_access_youtube: u8,
}

impl ScopeFlags {
    /// Membership of the single top-level YouTube scope decides the
    /// capability; the force-ssl and readonly grants are not consulted.
    pub fn from_scope_string(scope: &str) -> Self {
        let granted = scope.split(' ').any(|s| s == YOUTUBE_SCOPE);
        Self {
            can_access_youtube: granted as u8,
        }
    }
}

/// Build the authorization URL for a user, persisting a fresh state nonce.
///
/// Overwrites any previous pending nonce for that user, which implicitly
/// cancels an outstanding authorization attempt.
pub async fn build_authorization_url(app: &AppState, user_id: &str) -> Result<String> {
    let client_id = app.store.get_app_value(APP_ID, KEY_CLIENT_ID).await?;
    if client_id.is_empty() {
        return Err(Error::MissingCredentials);
    }

    let nonce = Uuid::new_v4().to_string();
    app.store
        .set_user_value(user_id, APP_ID, KEY_OAUTH_STATE, &nonce)
        .await?;

    let params = AuthUrlParams {
        client_id: &client_id,
        scope: REQUESTED_SCOPES.join(" "),
        redirect_uri: app.redirect_uri(user_id),
        response_type: "code",
        access_type: "offline",
        prompt: "consent",
        state: &nonce,
    };
    let query = serde_urlencoded::to_string(&params)?;

    Ok(format!("{}?{}", app.endpoints.auth_url, query))
}

/// Validate an OAuth callback and exchange its code for a token pair.
///
/// The granted scopes are recorded and the pending nonce is cleared before
/// validation, so a rejected callback still leaves the scope flags visible
/// and the nonce unusable for replay.
pub async fn handle_callback(
    app: &AppState,
    user_id: &str,
    code: &str,
    received_state: &str,
    scope: &str,
) -> Result<()> {
    let stored_state = app
        .store
        .get_user_value(user_id, APP_ID, KEY_OAUTH_STATE)
        .await?;
    let client_id = app.store.get_app_value(APP_ID, KEY_CLIENT_ID).await?;
    let client_secret = app.store.get_app_value(APP_ID, KEY_CLIENT_SECRET).await?;

    let flags = ScopeFlags::from_scope_string(scope);
    let flags_json = serde_json::to_string(&flags)?;
    app.store
        .set_user_value(user_id, APP_ID, KEY_USER_SCOPES, &flags_json)
        .await?;

    // The nonce is single-use: clear it before anything else can fail.
    app.store
        .set_user_value(user_id, APP_ID, KEY_OAUTH_STATE, "")
        .await?;

    if client_id.is_empty()
        || client_secret.is_empty()
        || stored_state.is_empty()
        || stored_state != received_state
    {
        return Err(Error::StateMismatch);
    }

    let redirect_uri = app.redirect_uri(user_id);
    let response =
        exchange_code(app, &client_id, &client_secret, &redirect_uri, code).await?;

    let (access_token, refresh_token) = match (&response.access_token, &response.refresh_token) {
        (Some(access), Some(refresh)) => (access.clone(), refresh.clone()),
        (Some(_), None) => {
            return Err(Error::TokenExchangeFailed(
                response.error_message("missing refresh token in Google response"),
            ))
        }
        _ => {
            return Err(Error::TokenExchangeFailed(
                response.error_message("missing access token in Google response"),
            ))
        }
    };

    // Stored back to back; the pair is only ever observed complete.
    app.store
        .set_user_value(user_id, APP_ID, KEY_ACCESS_TOKEN, &access_token)
        .await?;
    app.store
        .set_user_value(user_id, APP_ID, KEY_REFRESH_TOKEN, &refresh_token)
        .await?;

    info!("stored OAuth token pair for user {user_id}");
    Ok(())
}

/// Exchange a stored refresh token for a fresh access token.
///
/// Google may omit the refresh token from a refresh response; the old one
/// stays valid and is kept in that case. Returns the new access token.
pub async fn refresh_access_token(app: &AppState, user_id: &str) -> Result<String> {
    let client_id = app.store.get_app_value(APP_ID, KEY_CLIENT_ID).await?;
    let client_secret = app.store.get_app_value(APP_ID, KEY_CLIENT_SECRET).await?;
    if client_id.is_empty() || client_secret.is_empty() {
        return Err(Error::MissingCredentials);
    }

    let refresh_token = app
        .store
        .get_user_value(user_id, APP_ID, KEY_REFRESH_TOKEN)
        .await?;
    if refresh_token.is_empty() {
        return Err(Error::TokenExchangeFailed(format!(
            "no refresh token stored for user {user_id}"
        )));
    }

    debug!("refreshing access token at {}", app.endpoints.token_url);
    let response = app
        .client
        .post(&app.endpoints.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::TokenExchangeFailed(format!("token request failed: {e}")))?;

    let response: TokenResponse = response
        .json()
        .await
        .map_err(|e| Error::TokenExchangeFailed(format!("unparseable token response: {e}")))?;

    let access_token = response.access_token.clone().ok_or_else(|| {
        Error::TokenExchangeFailed(response.error_message("missing access token in Google response"))
    })?;

    app.store
        .set_user_value(user_id, APP_ID, KEY_ACCESS_TOKEN, &access_token)
        .await?;
    if let Some(new_refresh) = &response.refresh_token {
        app.store
            .set_user_value(user_id, APP_ID, KEY_REFRESH_TOKEN, new_refresh)
            .await?;
    }

    info!("refreshed access token for user {user_id}");
    Ok(access_token)
}

async fn exchange_code(
    app: &AppState,
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
    code: &str,
) -> Result<TokenResponse> {
    debug!(
        "exchanging authorization code at {}",
        app.endpoints.token_url
    );

    let response = app
        .client
        .post(&app.endpoints.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| Error::TokenExchangeFailed(format!("token request failed: {e}")))?;

    // Google reports failures with a JSON error body; parse either way and
    // let the caller decide based on which fields are present.
    response
        .json()
        .await
        .map_err(|e| Error::TokenExchangeFailed(format!("unparseable token response: {e}")))
}
