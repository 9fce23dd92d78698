use std::path::PathBuf;

/// Errors surfaced by the OAuth flow, broadcast scheduling, and thumbnail
/// upload paths.
///
/// Callback-path errors are caught by the HTTP handler and turned into a
/// logged message plus a redirect; command-path errors propagate to the CLI
/// and exit non-zero.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("application credentials are not configured")]
    MissingCredentials,

    #[error("OAuth state mismatch: callback does not match the pending authorization")]
    StateMismatch,

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("invalid broadcast spec: {0}")]
    InvalidSpec(String),

    #[error("upstream API error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("thumbnail file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("thumbnail file unreadable: {}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("chunk upload failed after {bytes_sent} bytes: {message}")]
    ChunkUploadFailed { bytes_sent: u64, message: String },

    #[error("config store error: {0}")]
    Store(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    QueryEncoding(#[from] serde_urlencoded::ser::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Build an [`Error::Upstream`] out of a non-success API response,
    /// carrying whatever the platform put in the body.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "failed to read error response".to_string());
        Self::Upstream { status, message }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
