use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{oauth, state::AppState};

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub error: String,
}

/// Receive the OAuth callback and exchange its code for an access token.
///
/// Every outcome redirects the browser to the settings view; success and
/// failure differ only in what gets logged. In particular an upstream
/// `error` parameter still runs the full callback handling, so the pending
/// nonce is consumed and the (empty) granted scopes are recorded.
pub async fn callback(
    State(app): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    if !params.error.is_empty() {
        warn!(
            "authorization for user {user_id} reported an upstream error: {}",
            params.error
        );
    }

    match oauth::handle_callback(&app, &user_id, &params.code, &params.state, &params.scope).await
    {
        Ok(()) => info!("OAuth authorization completed for user {user_id}"),
        Err(err) => error!("OAuth callback failed for user {user_id}: {err}"),
    }

    Redirect::to(&app.settings_url())
}
