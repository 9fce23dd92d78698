use axum::{routing::get, Router};

use crate::state::AppState;

pub mod google;

/// Build the application router.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        // Google OAuth callback; the user id rides in the path.
        .route("/oauth/google/callback/:user_id", get(google::callback))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn healthz() -> &'static str {
    "ok"
}
