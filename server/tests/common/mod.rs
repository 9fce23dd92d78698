use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use streamsched::state::{AppState, GoogleEndpoints};
use streamsched::store::MemoryStore;

/// Serve a router on an ephemeral port and return its address.
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// An app state wired to an in-memory store and a fixture server address.
pub fn test_app(addr: SocketAddr) -> AppState {
    AppState {
        store: Arc::new(MemoryStore::new()),
        client: reqwest::Client::new(),
        endpoints: GoogleEndpoints::with_base(&format!("http://{addr}")),
        domain: "cloud.example.com".to_string(),
        protocol: "https".to_string(),
    }
}
