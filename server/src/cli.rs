//! Command surface: serve the callback endpoint, configure API
//! credentials, and schedule broadcasts.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use tracing::info;

use crate::broadcast::{self, BroadcastSpec, PrivacyStatus};
use crate::oauth;
use crate::state::AppState;
use crate::store::{APP_ID, KEY_ACCESS_TOKEN, KEY_API_KEY, KEY_CLIENT_ID, KEY_CLIENT_SECRET};
use crate::upload;

/// Schedule live broadcasts on YouTube.
#[derive(Parser, Debug)]
#[clap(name = "streamsched", version)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server that receives OAuth callbacks
    Serve {
        #[clap(long, default_value = "127.0.0.1")]
        host: String,
        #[clap(long, default_value = "3000")]
        port: u16,
    },
    /// Store the application's API credentials and print the authorization
    /// URL for a user
    Configure {
        /// User to authorize
        user: String,
        /// YouTube API key
        #[clap(short = 'k', long)]
        api_key: String,
        /// OAuth client ID
        #[clap(short = 'i', long)]
        client_id: String,
        /// OAuth client secret
        #[clap(short = 's', long)]
        client_secret: String,
    },
    /// Schedule a broadcast for an authorized user
    Schedule {
        /// User whose stored access token is used
        user: String,
        /// The broadcast's title
        #[clap(short, long)]
        title: String,
        /// The broadcast's description
        #[clap(short, long)]
        description: Option<String>,
        /// Scheduled start, ISO 8601 (YYYY-MM-DDThh:mm:ssZ)
        #[clap(short, long)]
        start_time: String,
        /// Scheduled end, ISO 8601
        #[clap(short, long)]
        end_time: Option<String>,
        /// Designate the broadcast as child-directed
        #[clap(short, long)]
        kids: bool,
        /// The broadcast's privacy status
        #[clap(short, long, value_enum, default_value_t = PrivacyStatus::Private)]
        privacy_status: PrivacyStatus,
        /// Path to a thumbnail image to attach after creation
        #[clap(long)]
        thumbnail: Option<PathBuf>,
    },
}

pub async fn serve(app: AppState, host: &str, port: u16) -> color_eyre::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");
    axum::serve(listener, crate::routes::routes(app)).await?;
    Ok(())
}

pub async fn configure(
    app: &AppState,
    user: &str,
    api_key: &str,
    client_id: &str,
    client_secret: &str,
) -> color_eyre::Result<()> {
    app.store.set_app_value(APP_ID, KEY_API_KEY, api_key).await?;
    app.store
        .set_app_value(APP_ID, KEY_CLIENT_ID, client_id)
        .await?;
    app.store
        .set_app_value(APP_ID, KEY_CLIENT_SECRET, client_secret)
        .await?;

    let url = oauth::build_authorization_url(app, user).await?;
    println!("Access the following URL in your browser to authorize YouTube access:");
    println!("{url}");
    Ok(())
}

pub async fn schedule(
    app: &AppState,
    user: &str,
    spec: BroadcastSpec,
    thumbnail: Option<PathBuf>,
) -> color_eyre::Result<()> {
    let access_token = app
        .store
        .get_user_value(user, APP_ID, KEY_ACCESS_TOKEN)
        .await?;
    if access_token.is_empty() {
        color_eyre::eyre::bail!(
            "no access token stored for user {user}; run `streamsched configure` and authorize first"
        );
    }

    let broadcast_id =
        broadcast::create_broadcast(&app.client, &app.endpoints, &access_token, &spec)
            .await
            .wrap_err("broadcast creation failed")?;
    println!("Scheduled broadcast {broadcast_id}");

    if let Some(path) = thumbnail {
        // The broadcast is already committed at this point; a thumbnail
        // failure must not read as a scheduling failure.
        let bytes = upload::upload_thumbnail(
            &app.client,
            &app.endpoints,
            &access_token,
            &broadcast_id,
            &path,
        )
        .await
        .wrap_err_with(|| {
            format!("thumbnail upload failed; broadcast {broadcast_id} was still created")
        })?;
        println!("Uploaded thumbnail ({bytes} bytes)");
    }

    Ok(())
}
