//! Scheduling of live broadcasts via the YouTube Data API.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::state::GoogleEndpoints;

/// Visibility of a scheduled broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Unlisted,
    Public,
}

/// A broadcast to be scheduled. Timestamps are ISO-8601 (RFC 3339) strings.
#[derive(Debug, Clone, Default)]
pub struct BroadcastSpec {
    pub title: String,
    pub description: Option<String>,
    pub scheduled_start: String,
    pub scheduled_end: Option<String>,
    pub made_for_kids: bool,
    pub privacy_status: PrivacyStatus,
}

impl BroadcastSpec {
    fn validate(&self) -> Result<()> {
        if self.title.is_empty() {
            return Err(Error::InvalidSpec("title is required".to_string()));
        }
        if self.scheduled_start.is_empty() {
            return Err(Error::InvalidSpec(
                "scheduled start time is required".to_string(),
            ));
        }
        chrono::DateTime::parse_from_rfc3339(&self.scheduled_start).map_err(|e| {
            Error::InvalidSpec(format!("scheduled start time is not ISO 8601: {e}"))
        })?;
        if let Some(end) = &self.scheduled_end {
            chrono::DateTime::parse_from_rfc3339(end).map_err(|e| {
                Error::InvalidSpec(format!("scheduled end time is not ISO 8601: {e}"))
            })?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    scheduled_start_time: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduled_end_time: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    self_declared_made_for_kids: bool,
    privacy_status: PrivacyStatus,
}

#[derive(Serialize)]
struct LiveBroadcastInsert<'a> {
    kind: &'static str,
    snippet: Snippet<'a>,
    status: Status,
}

impl<'a> LiveBroadcastInsert<'a> {
    fn from_spec(spec: &'a BroadcastSpec) -> Self {
        Self {
            kind: "youtube#liveBroadcast",
            snippet: Snippet {
                title: &spec.title,
                description: spec.description.as_deref(),
                scheduled_start_time: &spec.scheduled_start,
                scheduled_end_time: spec.scheduled_end.as_deref(),
            },
            status: Status {
                self_declared_made_for_kids: spec.made_for_kids,
                privacy_status: spec.privacy_status,
            },
        }
    }
}

#[derive(Deserialize)]
struct InsertResponse {
    id: String,
}

/// Create the broadcast, persisting the snippet and status sub-resources in
/// a single insert call, and return the platform-assigned id.
///
/// Never retried here: scheduling is user-initiated and non-idempotent, so
/// a blind retry could create the broadcast twice.
pub async fn create_broadcast(
    client: &reqwest::Client,
    endpoints: &GoogleEndpoints,
    access_token: &str,
    spec: &BroadcastSpec,
) -> Result<String> {
    spec.validate()?;

    let url = format!("{}/youtube/v3/liveBroadcasts", endpoints.api_base);
    let response = client
        .post(&url)
        .query(&[("part", "snippet,status")])
        .bearer_auth(access_token)
        .json(&LiveBroadcastInsert::from_spec(spec))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(Error::from_response(response).await);
    }

    let inserted: InsertResponse = response.json().await?;
    info!("scheduled broadcast {}", inserted.id);
    Ok(inserted.id)
}
