//! Downloading a mod archive to a `.download` side file with resume
//! support (spec §4.2, §6). Grounded on the teacher's download operation,
//! generalized to round the resume offset down to a 1MiB boundary (the
//! remote CDN may have served a byte range that ends mid-chunk on a prior
//! attempt, so the last partial megabyte is always re-fetched rather than
//! trusted).

use base_error::{GenericError, HttpError, Result};
use modio_common::cancellation::{CancellationFlag, CancellationToken};
use modio_common::io::{Readable, Writeable};
use modio_file::FileObject;

use crate::client::{parse_location, read_response_head, serialize_request, MAX_REDIRECTS};
use crate::headers::Headers;
use crate::request::Request;
use crate::status::StatusCode;
use crate::transport::{Connection, Transport};

const RESUME_ALIGNMENT: u64 = 1024 * 1024;
const PARTIAL_CONTENT: StatusCode = StatusCode(206);

/// Body bytes are written to `file` in pieces this large, the same
/// granularity `compression::zip::extract_entry` reads compressed bytes
/// at, so a caller watching `on_progress`/cancellation reacts within one
/// chunk instead of waiting for a multi-hundred-megabyte body to land
/// whole.
const CHUNK_SIZE: usize = 64 * 1024;

/// Downloads into `file`, resuming from whatever `file` already holds.
/// Returns the total number of bytes the side file holds once the
/// transfer completes.
///
/// The body is streamed to `file` in `CHUNK_SIZE` pieces rather than
/// buffered whole: `cancel` is checked and `on_progress` called after
/// every chunk, so a cancellation mid-transfer stops writing promptly
/// and leaves the partial bytes already on disk for a later resume.
pub async fn download(
    transport: &dyn Transport,
    host: &str,
    port: u16,
    use_tls: bool,
    mut request: Request,
    allowed_hosts: &[String],
    file: &FileObject,
    cancel: &CancellationFlag,
    mut on_progress: impl FnMut(u64) + Send,
) -> Result<u64> {
    if cancel.is_cancelled() {
        return Err(GenericError::OperationCanceled.into());
    }

    let existing = file.size().await?;
    let resume_at = (existing / RESUME_ALIGNMENT) * RESUME_ALIGNMENT;

    if resume_at > 0 {
        request = request_with_range(request, resume_at);
    }

    let (status, headers, mut conn, leftover) = connect_following_redirects(transport, host, port, use_tls, request, allowed_hosts).await?;

    if !status.is_success() && status != PARTIAL_CONTENT {
        return Err(HttpError::ResourceNotAvailable.into());
    }

    let write_offset = if status == PARTIAL_CONTENT { resume_at } else { 0 };
    if write_offset == 0 && resume_at > 0 {
        // Server ignored the Range request and sent the whole body again.
        file.truncate(0).await?;
    }

    let content_length = headers.get("Content-Length").and_then(|v| v.parse::<u64>().ok());

    let mut written: u64 = 0;
    if !leftover.is_empty() {
        file.write_some_at(write_offset, &leftover).await?;
        written = leftover.len() as u64;
        on_progress(write_offset + written);
    }

    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        if let Some(len) = content_length {
            if written >= len {
                break;
            }
        }

        if cancel.is_cancelled() {
            return Err(GenericError::OperationCanceled.into());
        }

        let n = conn.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        file.write_some_at(write_offset + written, &buf[..n]).await?;
        written += n as u64;
        on_progress(write_offset + written);
    }

    if cancel.is_cancelled() {
        return Err(GenericError::OperationCanceled.into());
    }

    Ok(write_offset + written)
}

/// Connects and sends `request`, following redirects whose target host is
/// in `allowed_hosts` (same policy as `client::send_with_redirects`), but
/// stops as soon as the final response's head is parsed so the caller can
/// stream the body itself instead of receiving it already buffered.
async fn connect_following_redirects(
    transport: &dyn Transport,
    host: &str,
    port: u16,
    use_tls: bool,
    request: Request,
    allowed_hosts: &[String],
) -> Result<(StatusCode, Headers, Box<dyn Connection>, Vec<u8>)> {
    let mut current_host = host.to_string();
    let mut current_port = port;
    let mut current_tls = use_tls;
    let mut current_request = request;

    for _ in 0..=MAX_REDIRECTS {
        let mut conn = transport.connect(&current_host, current_port, current_tls).await?;
        let raw = serialize_request(&current_request, &current_host);
        conn.write_all(&raw).await?;
        conn.flush().await?;
        let (status, headers, leftover) = read_response_head(conn.as_mut()).await?;

        if status.as_u16() == 502 {
            return Err(HttpError::ServersOverloaded.into());
        }

        if !status.is_redirect() {
            return Ok((status, headers, conn, leftover));
        }

        let location = headers.get("Location").ok_or(HttpError::InvalidResponse)?;
        let (next_host, next_port, next_tls, next_path) = parse_location(location)?;

        if !allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(&next_host)) {
            return Err(HttpError::DownloadNotPermitted.into());
        }

        current_request.path = next_path;
        current_host = next_host;
        current_port = next_port;
        current_tls = next_tls;
    }

    Err(HttpError::ExcessiveRedirects.into())
}

fn request_with_range(request: Request, resume_at: u64) -> Request {
    let mut request = request;
    request.headers.insert("Range", format!("bytes={}-", resume_at));
    request
}

/// Discards whatever partial bytes a download left behind. `download`
/// itself never calls this: its own cancellation checks leave the side
/// file alone so a later attempt can resume from it. This is for the
/// caller-level distinction mod.io draws between that and a host
/// explicitly cancelling the containing install altogether, which gets
/// nothing left to resume from.
pub async fn discard_partial_download(file: &FileObject) -> Result<()> {
    file.truncate(0).await
}
