use clap::Parser;
use fixtures::{google::google_router, run_server, FixtureArgs};

/// Mock Google OAuth + YouTube API fixture server
#[derive(Parser, Debug)]
#[clap(name = "google-fixture")]
struct Cli {
    #[clap(flatten)]
    common: FixtureArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let (router, _mock) = google_router();
    run_server(args.common, router).await
}
