use clap::Parser;

use streamsched::broadcast::BroadcastSpec;
use streamsched::cli::{self, Cli, Command};
use streamsched::state::AppState;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(Cli::parse()))
}

async fn run(cli: Cli) -> color_eyre::Result<()> {
    setup_tracing();

    let app = AppState::from_env()?;

    match cli.command {
        Command::Serve { host, port } => cli::serve(app, &host, port).await,
        Command::Configure {
            user,
            api_key,
            client_id,
            client_secret,
        } => cli::configure(&app, &user, &api_key, &client_id, &client_secret).await,
        Command::Schedule {
            user,
            title,
            description,
            start_time,
            end_time,
            kids,
            privacy_status,
            thumbnail,
        } => {
            let spec = BroadcastSpec {
                title,
                description,
                scheduled_start: start_time,
                scheduled_end: end_time,
                made_for_kids: kids,
                privacy_status,
            };
            cli::schedule(&app, &user, spec, thumbnail).await
        }
    }
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
