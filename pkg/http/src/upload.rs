//! Uploading a mod file, including the multipart session protocol large
//! archives use (spec §4.2, §9 "multipart upload"). Grounded on the
//! teacher's upload operation, generalized with a shared progress counter
//! (so a caller polling from another task sees the same number the
//! operation itself is updating) and the 400/403 branch the API uses to
//! distinguish "this window was already accepted, keep going" from "this
//! session is dead".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use base_error::{GenericError, HttpError, Result};
use modio_common::cancellation::{CancellationFlag, CancellationToken};
use modio_file::FileObject;
use serde::Deserialize;

use crate::client::send_with_redirects;
use crate::request::{Body, Method, RequestBuilder};
use crate::status::StatusCode;
use crate::transport::Transport;

/// Files larger than this use the multipart session protocol instead of
/// a single request body (spec §9).
pub const MULTIPART_THRESHOLD: u64 = 50 * 1024 * 1024;
const WINDOW_SIZE: u64 = 50 * 1024 * 1024;

/// A progress counter shared between the running upload operation and
/// whatever polls it for a progress bar (spec §4.2 `ModProgressInfo`).
#[derive(Clone, Default)]
pub struct UploadProgress(Arc<AtomicU64>);

impl UploadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self, value: u64) {
        self.0.store(value, Ordering::SeqCst);
    }
}

#[derive(Deserialize)]
struct MultipartSession {
    upload_id: String,
}

pub async fn create_multipart_session(
    transport: &dyn Transport,
    host: &str,
    port: u16,
    use_tls: bool,
    api_key: &str,
    bearer_token: &str,
    filename: &str,
) -> Result<String> {
    let request = RequestBuilder::new(Method::Post, "/v1/multipart/upload")
        .with_api_key(api_key)
        .with_bearer_token(bearer_token)
        .with_body(Body::UrlEncoded(vec![("filename".to_string(), filename.to_string())]))
        .build();

    let response = send_with_redirects(transport, host, port, use_tls, request, &[]).await?;
    if !response.status.is_success() {
        return Err(HttpError::InvalidResponse.into());
    }
    let session: MultipartSession = response.body_as_json().map_err(|_| HttpError::InvalidResponse)?;
    Ok(session.upload_id)
}

/// Uploads one window of a multipart session. A `400` is the API's way
/// of saying this exact byte range was already accepted on a prior
/// attempt (safe to treat as success and move on); a `403` means the
/// session itself is no longer valid and nothing later can recover it.
pub async fn upload_part(
    transport: &dyn Transport,
    host: &str,
    port: u16,
    use_tls: bool,
    api_key: &str,
    bearer_token: &str,
    upload_id: &str,
    data: &[u8],
    start: u64,
    end: u64,
    total: u64,
) -> Result<()> {
    let request = RequestBuilder::new(Method::Put, format!("/v1/multipart/upload/{}", upload_id))
        .with_api_key(api_key)
        .with_bearer_token(bearer_token)
        .with_content_range(start, end, total)
        .with_body(Body::Bytes(data.to_vec()))
        .build();

    let response = send_with_redirects(transport, host, port, use_tls, request, &[]).await?;

    if response.status.is_success() || response.status.as_u16() == 400 {
        return Ok(());
    }
    if response.status.as_u16() == 403 {
        return Err(HttpError::InsufficientPermissions.into());
    }
    Err(HttpError::InvalidResponse.into())
}

pub async fn complete_multipart_session(
    transport: &dyn Transport,
    host: &str,
    port: u16,
    use_tls: bool,
    api_key: &str,
    bearer_token: &str,
    upload_id: &str,
) -> Result<()> {
    let request = RequestBuilder::new(Method::Post, format!("/v1/multipart/upload/{}", upload_id))
        .with_api_key(api_key)
        .with_bearer_token(bearer_token)
        .build();

    let response = send_with_redirects(transport, host, port, use_tls, request, &[]).await?;
    if response.status.is_success() {
        Ok(())
    } else {
        Err(HttpError::InvalidResponse.into())
    }
}

pub async fn submit_modfile_with_upload_id(
    transport: &dyn Transport,
    host: &str,
    port: u16,
    use_tls: bool,
    api_key: &str,
    bearer_token: &str,
    mod_id: u64,
    upload_id: &str,
) -> Result<StatusCode> {
    let request = RequestBuilder::new(Method::Post, format!("/v1/games/{{game-id}}/mods/{}/files", mod_id))
        .with_api_key(api_key)
        .with_bearer_token(bearer_token)
        .with_body(Body::UrlEncoded(vec![("upload_id".to_string(), upload_id.to_string())]))
        .build();

    let response = send_with_redirects(transport, host, port, use_tls, request, &[]).await?;
    Ok(response.status)
}

/// Uploads `file`'s full contents as a single modfile, choosing the
/// multipart session protocol when it is larger than
/// [`MULTIPART_THRESHOLD`]. `cancel` is checked between windows so a
/// large upload can be stopped without losing the session (the caller
/// may resume it later with the same `upload_id`).
pub async fn upload_modfile(
    transport: &dyn Transport,
    host: &str,
    port: u16,
    use_tls: bool,
    api_key: &str,
    bearer_token: &str,
    mod_id: u64,
    filename: &str,
    file: &FileObject,
    cancel: &CancellationFlag,
    progress: &UploadProgress,
) -> Result<StatusCode> {
    let size = file.size().await?;

    if size <= MULTIPART_THRESHOLD {
        let buf = file.read_some_at(0, size as usize).await?;
        let data = buf.to_vec();
        let request = RequestBuilder::new(Method::Post, format!("/v1/games/{{game-id}}/mods/{}/files", mod_id))
            .with_api_key(api_key)
            .with_bearer_token(bearer_token)
            .with_body(Body::Multipart {
                boundary: "modio-upload-boundary".to_string(),
                parts: vec![crate::request::MultipartPart {
                    name: "filedata".to_string(),
                    filename: Some(filename.to_string()),
                    content_type: Some("application/zip".to_string()),
                    data,
                }],
            })
            .build();
        let response = send_with_redirects(transport, host, port, use_tls, request, &[]).await?;
        progress.set(size);
        return Ok(response.status);
    }

    let upload_id = create_multipart_session(transport, host, port, use_tls, api_key, bearer_token, filename).await?;

    let mut offset = 0u64;
    while offset < size {
        if cancel.is_cancelled() {
            return Err(GenericError::OperationCanceled.into());
        }
        let window_len = WINDOW_SIZE.min(size - offset);
        let buf = file.read_some_at(offset, window_len as usize).await?;
        let data = buf.to_vec();
        let end = offset + data.len() as u64 - 1;
        upload_part(transport, host, port, use_tls, api_key, bearer_token, &upload_id, &data, offset, end, size).await?;
        offset += data.len() as u64;
        progress.set(offset);
    }

    complete_multipart_session(transport, host, port, use_tls, api_key, bearer_token, &upload_id).await?;
    submit_modfile_with_upload_id(transport, host, port, use_tls, api_key, bearer_token, mod_id, &upload_id).await
}
