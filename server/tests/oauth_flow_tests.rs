mod common;

use fixtures::google::{google_router, GoogleMock, REJECTED_CODE};
use streamsched::oauth::{
    self, YOUTUBE_FORCE_SSL_SCOPE, YOUTUBE_READONLY_SCOPE, YOUTUBE_SCOPE,
};
use streamsched::state::AppState;
use streamsched::store::{
    APP_ID, KEY_ACCESS_TOKEN, KEY_CLIENT_ID, KEY_CLIENT_SECRET, KEY_OAUTH_STATE,
    KEY_REFRESH_TOKEN, KEY_USER_SCOPES,
};
use streamsched::Error;

async fn configured_app() -> (AppState, GoogleMock) {
    let (router, mock) = google_router();
    let addr = common::spawn(router).await;
    let app = common::test_app(addr);
    app.store
        .set_app_value(APP_ID, KEY_CLIENT_ID, "client-123")
        .await
        .unwrap();
    app.store
        .set_app_value(APP_ID, KEY_CLIENT_SECRET, "secret-456")
        .await
        .unwrap();
    (app, mock)
}

fn state_param(auth_url: &str) -> String {
    let url = url::Url::parse(auth_url).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .expect("authorization URL is missing the state parameter")
}

fn granted_scopes() -> String {
    format!("{YOUTUBE_SCOPE} {YOUTUBE_FORCE_SSL_SCOPE} {YOUTUBE_READONLY_SCOPE}")
}

#[tokio::test]
async fn authorization_then_callback_stores_the_token_pair() {
    let (app, mock) = configured_app().await;

    let auth_url = oauth::build_authorization_url(&app, "alice").await.unwrap();
    let state = state_param(&auth_url);

    oauth::handle_callback(&app, "alice", "good-code", &state, &granted_scopes())
        .await
        .unwrap();

    let access = app
        .store
        .get_user_value("alice", APP_ID, KEY_ACCESS_TOKEN)
        .await
        .unwrap();
    let refresh = app
        .store
        .get_user_value("alice", APP_ID, KEY_REFRESH_TOKEN)
        .await
        .unwrap();
    assert!(access.starts_with("access-"));
    assert!(refresh.starts_with("refresh-"));

    // The capability flag was derived from the granted scopes.
    let scopes = app
        .store
        .get_user_value("alice", APP_ID, KEY_USER_SCOPES)
        .await
        .unwrap();
    assert_eq!(scopes, r#"{"can_access_youtube":1}"#);

    // The nonce was consumed.
    let nonce = app
        .store
        .get_user_value("alice", APP_ID, KEY_OAUTH_STATE)
        .await
        .unwrap();
    assert_eq!(nonce, "");

    // The exchange carried the code, credentials, and the exact redirect
    // URI the authorization URL was built with.
    let requests = mock.token_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["grant_type"], "authorization_code");
    assert_eq!(requests[0]["code"], "good-code");
    assert_eq!(requests[0]["client_id"], "client-123");
    assert_eq!(requests[0]["client_secret"], "secret-456");
    assert_eq!(
        requests[0]["redirect_uri"],
        "https://cloud.example.com/oauth/google/callback/alice"
    );
}

#[tokio::test]
async fn forged_state_is_rejected_without_an_exchange() {
    let (app, mock) = configured_app().await;

    oauth::build_authorization_url(&app, "alice").await.unwrap();

    let err = oauth::handle_callback(&app, "alice", "good-code", "forged-state", "")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StateMismatch));

    // No exchange was attempted and no token was stored.
    assert!(mock.token_requests().is_empty());
    assert_eq!(
        app.store
            .get_user_value("alice", APP_ID, KEY_ACCESS_TOKEN)
            .await
            .unwrap(),
        ""
    );

    // Even a rejected callback records the (empty) granted scopes.
    assert_eq!(
        app.store
            .get_user_value("alice", APP_ID, KEY_USER_SCOPES)
            .await
            .unwrap(),
        r#"{"can_access_youtube":0}"#
    );
}

#[tokio::test]
async fn consumed_state_cannot_be_replayed() {
    let (app, _mock) = configured_app().await;

    let auth_url = oauth::build_authorization_url(&app, "alice").await.unwrap();
    let state = state_param(&auth_url);

    oauth::handle_callback(&app, "alice", "good-code", &state, &granted_scopes())
        .await
        .unwrap();

    // The same state a second time fails: the nonce was cleared on first use.
    let err = oauth::handle_callback(&app, "alice", "good-code", &state, &granted_scopes())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StateMismatch));
}

#[tokio::test]
async fn a_second_authorization_url_invalidates_the_first_nonce() {
    let (app, _mock) = configured_app().await;

    let first = oauth::build_authorization_url(&app, "alice").await.unwrap();
    let _second = oauth::build_authorization_url(&app, "alice").await.unwrap();

    let err = oauth::handle_callback(
        &app,
        "alice",
        "good-code",
        &state_param(&first),
        &granted_scopes(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::StateMismatch));
}

#[tokio::test]
async fn empty_code_with_valid_state_still_reaches_the_exchange() {
    let (app, mock) = configured_app().await;

    let auth_url = oauth::build_authorization_url(&app, "alice").await.unwrap();
    let state = state_param(&auth_url);

    let err = oauth::handle_callback(&app, "alice", "", &state, &granted_scopes())
        .await
        .unwrap_err();

    // State validation passed; the failure comes from the exchange itself.
    assert!(matches!(err, Error::TokenExchangeFailed(_)));
    assert_eq!(mock.token_requests().len(), 1);
}

#[tokio::test]
async fn rejected_code_fails_the_exchange() {
    let (app, _mock) = configured_app().await;

    let auth_url = oauth::build_authorization_url(&app, "alice").await.unwrap();
    let state = state_param(&auth_url);

    let err = oauth::handle_callback(&app, "alice", REJECTED_CODE, &state, &granted_scopes())
        .await
        .unwrap_err();
    match err {
        Error::TokenExchangeFailed(message) => assert!(message.contains("invalid_grant")),
        other => panic!("expected TokenExchangeFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn a_response_without_refresh_token_is_not_a_success() {
    let (app, mock) = configured_app().await;
    mock.omit_refresh_token(true);

    let auth_url = oauth::build_authorization_url(&app, "alice").await.unwrap();
    let state = state_param(&auth_url);

    let err = oauth::handle_callback(&app, "alice", "good-code", &state, &granted_scopes())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TokenExchangeFailed(_)));

    // Neither half of the pair was stored.
    assert_eq!(
        app.store
            .get_user_value("alice", APP_ID, KEY_ACCESS_TOKEN)
            .await
            .unwrap(),
        ""
    );
    assert_eq!(
        app.store
            .get_user_value("alice", APP_ID, KEY_REFRESH_TOKEN)
            .await
            .unwrap(),
        ""
    );
}

#[tokio::test]
async fn unconfigured_credentials_reject_the_callback() {
    let (router, mock) = google_router();
    let addr = common::spawn(router).await;
    let app = common::test_app(addr);

    // A pending nonce exists but the app credentials were never set.
    app.store
        .set_user_value("alice", APP_ID, KEY_OAUTH_STATE, "pending-nonce")
        .await
        .unwrap();

    let err = oauth::handle_callback(&app, "alice", "good-code", "pending-nonce", "")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::StateMismatch));
    assert!(mock.token_requests().is_empty());
}

#[tokio::test]
async fn refresh_keeps_the_old_refresh_token_when_omitted() {
    let (app, mock) = configured_app().await;

    let auth_url = oauth::build_authorization_url(&app, "alice").await.unwrap();
    let state = state_param(&auth_url);
    oauth::handle_callback(&app, "alice", "good-code", &state, &granted_scopes())
        .await
        .unwrap();
    let old_refresh = app
        .store
        .get_user_value("alice", APP_ID, KEY_REFRESH_TOKEN)
        .await
        .unwrap();

    let new_access = oauth::refresh_access_token(&app, "alice").await.unwrap();
    assert!(new_access.starts_with("access-"));
    assert_eq!(
        app.store
            .get_user_value("alice", APP_ID, KEY_ACCESS_TOKEN)
            .await
            .unwrap(),
        new_access
    );
    // The refresh grant reissued no refresh token; the stored one stays.
    assert_eq!(
        app.store
            .get_user_value("alice", APP_ID, KEY_REFRESH_TOKEN)
            .await
            .unwrap(),
        old_refresh
    );

    let requests = mock.token_requests();
    assert_eq!(requests.last().unwrap()["grant_type"], "refresh_token");
}

#[tokio::test]
async fn callback_endpoint_always_redirects_to_settings() {
    let (google, _mock) = google_router();
    let google_addr = common::spawn(google).await;
    let app = common::test_app(google_addr);
    app.store
        .set_app_value(APP_ID, KEY_CLIENT_ID, "client-123")
        .await
        .unwrap();
    app.store
        .set_app_value(APP_ID, KEY_CLIENT_SECRET, "secret-456")
        .await
        .unwrap();

    let auth_url = oauth::build_authorization_url(&app, "alice").await.unwrap();
    let state = state_param(&auth_url);

    let server_addr = common::spawn(streamsched::routes::routes(app.clone())).await;
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    // Successful authorization redirects to the settings view.
    let response = client
        .get(format!(
            "http://{server_addr}/oauth/google/callback/alice"
        ))
        .query(&[
            ("code", "good-code"),
            ("state", state.as_str()),
            ("scope", YOUTUBE_SCOPE),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "/settings/user"
    );
    assert!(app
        .store
        .get_user_value("alice", APP_ID, KEY_ACCESS_TOKEN)
        .await
        .unwrap()
        .starts_with("access-"));

    // A failing callback redirects to the very same place.
    let response = client
        .get(format!(
            "http://{server_addr}/oauth/google/callback/alice"
        ))
        .query(&[("code", ""), ("state", "stale"), ("scope", "")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "/settings/user"
    );
}
