//! streamsched schedules live broadcasts on YouTube on behalf of end
//! users: an OAuth2 authorization-code flow obtains delegated credentials,
//! one insert call creates the broadcast, and an optional thumbnail is
//! streamed to the resumable upload endpoint in 1 MiB chunks.

pub mod broadcast;
pub mod cli;
pub mod error;
pub mod oauth;
pub mod routes;
pub mod state;
pub mod store;
pub mod upload;

pub use error::{Error, Result};
