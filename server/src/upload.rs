//! Chunked thumbnail upload against the resumable upload protocol.
//!
//! The file is transmitted in fixed-size chunks with one chunk buffer
//! resident at a time, so memory use is bounded regardless of file size.

use std::ops::Range;
use std::path::Path;

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION};
use reqwest::StatusCode;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::state::GoogleEndpoints;

/// Fixed chunk size of the resumable upload protocol: 1 MiB.
pub const CHUNK_SIZE: u64 = 1024 * 1024;

/// Byte ranges covering `total` bytes in `chunk_size` steps. The final
/// range may be shorter than `chunk_size`; a zero-byte file yields none.
fn chunk_ranges(total: u64, chunk_size: u64) -> impl Iterator<Item = Range<u64>> {
    (0..total)
        .step_by(chunk_size as usize)
        .map(move |start| start..(start + chunk_size).min(total))
}

fn io_error(path: &Path, e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::FileNotFound(path.to_path_buf())
    } else {
        Error::FileUnreadable {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

/// Upload a thumbnail for a broadcast, streaming the file in 1 MiB chunks.
/// Returns the number of bytes transmitted.
///
/// No resume is implemented: any transport error or unexpected status
/// aborts the upload, reporting the bytes acknowledged so far, and a caller
/// may retry the whole operation with a fresh session.
pub async fn upload_thumbnail(
    client: &reqwest::Client,
    endpoints: &GoogleEndpoints,
    access_token: &str,
    broadcast_id: &str,
    path: &Path,
) -> Result<u64> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| io_error(path, e))?;
    let total = metadata.len();

    let content_type = mime_guess::from_path(path).first_or(mime::IMAGE_PNG);

    let session_uri = open_session(
        client,
        endpoints,
        access_token,
        broadcast_id,
        total,
        content_type.as_ref(),
    )
    .await?;
    debug!("opened resumable upload session for broadcast {broadcast_id}");

    // The handle is owned by this scope and dropped on every exit path.
    let mut file = File::open(path).await.map_err(|e| io_error(path, e))?;

    let mut buf = vec![0u8; CHUNK_SIZE as usize];
    let mut sent: u64 = 0;

    for range in chunk_ranges(total, CHUNK_SIZE) {
        let len = (range.end - range.start) as usize;
        file.read_exact(&mut buf[..len])
            .await
            .map_err(|e| Error::ChunkUploadFailed {
                bytes_sent: sent,
                message: format!("failed to read chunk at offset {}: {e}", range.start),
            })?;

        let content_range = format!("bytes {}-{}/{}", range.start, range.end - 1, total);
        let response = client
            .put(&session_uri)
            .bearer_auth(access_token)
            .header(CONTENT_TYPE, content_type.as_ref())
            .header(CONTENT_RANGE, &content_range)
            .body(buf[..len].to_vec())
            .send()
            .await
            .map_err(|e| Error::ChunkUploadFailed {
                bytes_sent: sent,
                message: format!("chunk transmission failed: {e}"),
            })?;

        let status = response.status();
        if status == StatusCode::PERMANENT_REDIRECT {
            // 308: the server recorded this chunk and expects more.
            sent = range.end;
            debug!("chunk acknowledged, {sent}/{total} bytes sent");
            continue;
        }
        if status.is_success() {
            // Final chunk acknowledged.
            sent = range.end;
            info!("thumbnail upload complete: {sent} bytes for broadcast {broadcast_id}");
            return Ok(sent);
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "failed to read error response".to_string());
        return Err(Error::ChunkUploadFailed {
            bytes_sent: sent,
            message: format!("unexpected status {status}: {message}"),
        });
    }

    // End of file reached without the server declaring completion.
    info!("thumbnail upload finished at end of file: {sent} bytes for broadcast {broadcast_id}");
    Ok(sent)
}

/// Open a resumable upload session, declaring the content type and total
/// size up front. Returns the session URI from the `Location` header.
async fn open_session(
    client: &reqwest::Client,
    endpoints: &GoogleEndpoints,
    access_token: &str,
    broadcast_id: &str,
    total: u64,
    content_type: &str,
) -> Result<String> {
    let url = format!("{}/upload/youtube/v3/thumbnails/set", endpoints.upload_base);
    let response = client
        .post(&url)
        .query(&[("videoId", broadcast_id), ("uploadType", "resumable")])
        .bearer_auth(access_token)
        .header("X-Upload-Content-Type", content_type)
        .header("X-Upload-Content-Length", total.to_string())
        .header(CONTENT_LENGTH, "0")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::from_response(response).await);
    }

    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| Error::Upstream {
            status: status.as_u16(),
            message: "resumable session response is missing the Location header".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn even_multiple_splits_into_full_chunks() {
        let ranges: Vec<_> = chunk_ranges(10 * MIB, CHUNK_SIZE).collect();
        assert_eq!(ranges.len(), 10);
        assert!(ranges.iter().all(|r| r.end - r.start == MIB));
        assert_eq!(ranges.last().unwrap().end, 10 * MIB);
    }

    #[test]
    fn trailing_partial_chunk_is_short() {
        let ranges: Vec<_> = chunk_ranges(2 * MIB + 512 * 1024, CHUNK_SIZE).collect();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].end - ranges[0].start, MIB);
        assert_eq!(ranges[1].end - ranges[1].start, MIB);
        assert_eq!(ranges[2].end - ranges[2].start, 512 * 1024);
    }

    #[test]
    fn file_smaller_than_a_chunk_is_one_range() {
        let ranges: Vec<_> = chunk_ranges(1000, CHUNK_SIZE).collect();
        assert_eq!(ranges, vec![0..1000]);
    }

    #[test]
    fn empty_file_yields_no_ranges() {
        assert_eq!(chunk_ranges(0, CHUNK_SIZE).count(), 0);
    }
}
