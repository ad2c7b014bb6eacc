//! Composed mod operations (spec §4.2, §4.4, §4.7, §6): subscribe,
//! unsubscribe, install, update, uninstall, and the deferred-unsubscribe
//! retry, each wiring the HTTP pipeline, the zip engine, and the file
//! service together under one of the collection entry's transactions.

use std::path::Path;
use std::sync::Arc;

use base_error::{ApiError, HttpError, ModManagementError, Result};
use modio_common::cancellation::{CancellationFlag, CancellationToken};
use modio_compression::{ArchiveReader, ArchiveWriter, CompressionMethod};
use modio_file::{paths, FileObject, FileService, OpenMode};
use modio_http::{Method, RequestBuilder};
use serde::Deserialize;

use crate::cache::ResponseCache;
use crate::collection::{ErrorClassification, ModCollectionEntry, ModState};
use crate::mod_collection::{ModCollection, SubscriptionChange};
use crate::ops::absolute_url::AbsoluteUrl;
use crate::ops::archive_source::{FileArchiveSource, FileInflateSink};
use crate::ops::http_ctx::HttpContext;
use crate::progress::ModProgressHandle;

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ModFileDownload {
    pub binary_url: String,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ModFile {
    pub id: u64,
    pub filesize: u64,
    pub download: ModFileDownload,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct ModProfile {
    pub id: u64,
    pub game_id: u64,
    pub metadata_blob: Option<String>,
    pub modfile: Option<ModFile>,
}

/// Fetches a mod's profile, consulting the mod-info cache first (spec
/// §4.6). A cache hit is deserialized straight out of the cached
/// `serde_json::Value`; a miss fetches from the API and populates the
/// cache for the next caller. Invariant 6's mutating ops are what keep
/// this from ever serving stale data: they call
/// [`ResponseCache::invalidate_mod_info`] before returning.
pub async fn fetch_mod_profile(ctx: &HttpContext, cache: &ResponseCache, mod_id: u64) -> Result<ModProfile> {
    if let Some(cached) = cache.mod_info(mod_id) {
        if let Ok(profile) = serde_json::from_value(cached) {
            return Ok(profile);
        }
    }

    let path = format!("/v1/games/{}/mods/{}", ctx.session.game_id, mod_id);
    // `.no_cache()`: this call already has its own cache (the mod-info
    // cache above, explicitly invalidated per invariant 6) — consulting
    // the generic URL cache too would let a stale 15s-old body slip
    // through right after that invalidation.
    let request = ctx.request(Method::Get, path).no_cache().build();
    let response = ctx.send(request).await?;
    let profile: ModProfile = response.body_as_json().map_err(|_| HttpError::InvalidResponse)?;

    if let Ok(value) = serde_json::to_value(&profile) {
        cache.set_mod_info(mod_id, value);
    }
    Ok(profile)
}

/// Subscribes `user_id` to `mod_id`: a success-no-op (already subscribed)
/// is treated identically to a fresh subscription (spec §7 "API success
/// no-op"). Either way the subscription delta creates/keeps an
/// `install_pending` entry once flushed.
pub async fn subscribe(ctx: &HttpContext, collection: &ModCollection, mod_id: u64, user_id: u64) -> Result<()> {
    let path = format!("/v1/games/{}/mods/{}/subscribe", ctx.session.game_id, mod_id);
    let request = ctx.authenticated_request(Method::Post, path)?.build();
    ctx.send(request).await?;
    collection.queue_subscription_change(user_id, SubscriptionChange::Add(mod_id));
    Ok(())
}

/// Unsubscribes `user_id` from `mod_id`. If the server call fails, the
/// mod is queued on the deferred-unsubscribe ledger instead of
/// propagating the error, so reconciliation retries it later (spec §3
/// "deferred unsubscribe ledger", §4.8 step 2).
pub async fn unsubscribe(ctx: &HttpContext, collection: &ModCollection, mod_id: u64, user_id: u64) -> Result<()> {
    let path = format!("/v1/games/{}/mods/{}/subscribe", ctx.session.game_id, mod_id);
    let request = ctx.authenticated_request(Method::Delete, path)?.build();
    match ctx.send(request).await {
        Ok(_) => {
            collection.queue_subscription_change(user_id, SubscriptionChange::Remove(mod_id));
            Ok(())
        }
        Err(err) => {
            collection.queue_deferred_unsubscribe(mod_id);
            Err(err)
        }
    }
}

/// Retries one entry on the deferred-unsubscribe ledger (spec §4.8 step
/// 2). On success the entry is removed from the ledger; on failure it
/// stays queued for the next tick.
pub async fn retry_unsubscribe(ctx: &HttpContext, collection: &ModCollection, mod_id: u64) -> Result<()> {
    let path = format!("/v1/games/{}/mods/{}/subscribe", ctx.session.game_id, mod_id);
    let request = ctx.authenticated_request(Method::Delete, path)?.build();
    ctx.send(request).await?;
    collection.remove_deferred_unsubscribe(mod_id);
    Ok(())
}

/// A server-rejected mod (removed, banned, game no longer accepting
/// submissions) is quarantined rather than retried (spec invariant 5);
/// everything else this composer can surface — I/O errors, transient
/// HTTP failures, a generic API error — is eligible for a retry within
/// the session's retry budget.
fn classify_install_error(err: &base_error::Error) -> ErrorClassification {
    if let Some(ApiError::ServerError { error_ref, message, .. }) = err.downcast_ref::<ApiError>() {
        if crate::error::UNRECOVERABLE_ERROR_REFS.contains(error_ref) {
            return ErrorClassification::UnrecoverableInstall(message.clone());
        }
    }
    ErrorClassification::RetryableInstall
}

/// Downloads and extracts a mod's current file release, driving the
/// entry through `downloading` and `extracting` to `installed` under one
/// transaction (spec §4.7's state diagram, §4.4 extraction). Used by
/// both install (`install_pending`) and update (`update_pending`).
pub async fn download_and_extract(
    ctx: &HttpContext,
    cache: &ResponseCache,
    storage_root: &Path,
    entry: &Arc<ModCollectionEntry>,
    progress: &ModProgressHandle,
    cancel: &CancellationFlag,
) -> Result<()> {
    let Some(txn) = entry.begin_transaction() else {
        return Ok(());
    };

    let result = download_and_extract_inner(ctx, cache, storage_root, entry, progress, cancel).await;

    match &result {
        Ok(()) => {
            entry.reset_retries();
            txn.commit();
        }
        Err(err) => {
            entry.set_last_error(classify_install_error(err));
            drop(txn);
        }
    }
    result
}

async fn download_and_extract_inner(
    ctx: &HttpContext,
    cache: &ResponseCache,
    storage_root: &Path,
    entry: &Arc<ModCollectionEntry>,
    progress: &ModProgressHandle,
    cancel: &CancellationFlag,
) -> Result<()> {
    let profile = fetch_mod_profile(ctx, cache, entry.id).await?;
    let modfile = profile.modfile.ok_or(ModManagementError::ModManagementDisabled)?;

    entry.current_state.store(ModState::Downloading);
    progress.set_state(crate::progress::ProgressState::Downloading);

    let archive_path = paths::mod_archive_file(storage_root, ctx.session.game_id, entry.id);
    let side_path = paths::download_side_file(&archive_path);
    // Opened without `overwrite`, so a `.download` side file left behind
    // by a cancelled attempt keeps whatever bytes it already has — the
    // resume support in `modio_http::download::download` depends on
    // `file.size()` reflecting a prior attempt's progress rather than
    // always observing zero.
    let archive_file = FileObject::open(&side_path, OpenMode::ReadWrite, false).await?;

    let download_url = AbsoluteUrl::parse(&modfile.download.binary_url)?;
    let download_request = RequestBuilder::new(Method::Get, download_url.path).build();
    modio_http::download::download(
        ctx.transport.as_ref(),
        &download_url.host,
        download_url.port,
        download_url.use_tls,
        download_request,
        &ctx.allowed_hosts,
        &archive_file,
        cancel,
        |sent| {
            progress.set_progress(sent, modfile.filesize);
        },
    )
    .await?;

    if !progress.is_live() {
        // The host dropped its `ModProgressInfo`, explicitly walking away
        // from this install rather than merely being interrupted
        // mid-attempt (the `cancel` flag's case, which stays resumable).
        // Nothing is left for a future pump to resume, so the side file
        // is discarded instead of kept around as a dangling partial.
        modio_http::download::discard_partial_download(&archive_file).await?;
        return Err(ModManagementError::InstallOrUpdateCancelled.into());
    }

    let mut archive_file = archive_file;
    archive_file.rename(&archive_path).await?;

    entry.current_state.store(ModState::Extracting);
    progress.set_state(crate::progress::ProgressState::Extracting);

    let dest_dir = paths::mod_dir(storage_root, ctx.session.game_id, entry.id);
    extract_archive(&archive_path, &dest_dir, progress, cancel).await?;

    let file_service = FileService::new();
    let size = file_service.folder_size(&dest_dir).await?;
    *entry.size_on_disk.lock().unwrap() = Some(size);
    *entry.path_on_disk.lock().unwrap() = Some(dest_dir.display().to_string());
    *entry.profile.lock().unwrap() = Some(serde_json::json!({
        "id": profile.id,
        "game_id": profile.game_id,
        "metadata_blob": profile.metadata_blob,
    }));

    file_service.delete_file(&archive_path).await?;
    entry.current_state.store(ModState::Installed);
    Ok(())
}

/// Re-fetches a mod's profile and, if its metadata has changed since the
/// last install, transitions an `installed` entry to `update_pending`
/// (spec §4.4's `installed -> [new metadata_id seen] -> update_pending`
/// edge). Invalidates the cached profile first (invariant 6) so the
/// fetch can't observe a copy of what's already installed. A no-op for
/// an entry that isn't currently `installed`.
pub async fn check_for_update(ctx: &HttpContext, cache: &ResponseCache, entry: &Arc<ModCollectionEntry>) -> Result<bool> {
    if entry.current_state.load() != ModState::Installed {
        return Ok(false);
    }

    cache.invalidate_mod_info(entry.id);
    let fresh = fetch_mod_profile(ctx, cache, entry.id).await?;

    let previous_blob = entry
        .profile
        .lock()
        .unwrap()
        .as_ref()
        .and_then(|v| v.get("metadata_blob").cloned())
        .unwrap_or(serde_json::Value::Null);
    let fresh_blob = serde_json::to_value(&fresh.metadata_blob).unwrap_or(serde_json::Value::Null);

    if fresh_blob != previous_blob {
        entry.current_state.store(ModState::UpdatePending);
        return Ok(true);
    }
    Ok(false)
}

async fn extract_archive(
    archive_path: &Path,
    dest_dir: &Path,
    progress: &ModProgressHandle,
    cancel: &CancellationFlag,
) -> Result<()> {
    let archive_file = FileObject::open(archive_path, OpenMode::ReadOnly, false).await?;
    let reader = ArchiveReader::open(FileArchiveSource::new(&archive_file)).await?;

    let entries: Vec<_> = reader.entries().to_vec();
    let total_uncompressed: u64 = entries.iter().map(|e| e.uncompressed_size).sum();
    let mut done = 0u64;

    for entry in &entries {
        if cancel.is_cancelled() || !progress.is_live() {
            return Err(base_error::GenericError::OperationCanceled.into());
        }

        let dest_path = dest_dir.join(&entry.name);
        if entry.is_directory {
            let service = FileService::new();
            service.create_folder(&dest_path).await?;
            continue;
        }

        let out = FileObject::create(&dest_path).await?;
        let mut sink = FileInflateSink::new(&out);
        let done_before_entry = done;
        reader
            .extract_entry_to(
                entry,
                &|| cancel.is_cancelled(),
                |n| progress.set_progress(done_before_entry + n, total_uncompressed),
                &mut sink,
            )
            .await?;

        done += entry.uncompressed_size;
        progress.set_progress(done, total_uncompressed);
    }

    Ok(())
}

/// Removes a mod's on-disk files (spec §4.7 `uninstall_pending` ->
/// deleted). On success the caller removes the entry from the
/// collection; on failure the entry is quarantined via
/// `ErrorClassification::DeleteDeferred`.
pub async fn uninstall(entry: &Arc<ModCollectionEntry>, storage_root: &Path, game_id: u64) -> Result<()> {
    let Some(txn) = entry.begin_transaction() else {
        return Ok(());
    };

    let dest_dir = paths::mod_dir(storage_root, game_id, entry.id);
    let service = FileService::new();
    let result = service.delete_folder_recursive(&dest_dir).await;

    match result {
        Ok(()) => {
            txn.commit();
            Ok(())
        }
        Err(err) => {
            entry.set_last_error(ErrorClassification::DeleteDeferred);
            drop(txn);
            Err(err)
        }
    }
}

/// Uploads a packaged mod archive as a new modfile revision (spec §4.2,
/// §4.5, §9). `source_dir` is zipped into a temporary archive first.
pub async fn upload(
    ctx: &HttpContext,
    mod_id: u64,
    source_dir: &Path,
    storage_root: &Path,
    progress: &ModProgressHandle,
    cancel: &CancellationFlag,
) -> Result<()> {
    progress.set_state(crate::progress::ProgressState::Compressing);
    let archive_path = paths::mod_archive_file(storage_root, ctx.session.game_id, mod_id);
    build_archive(source_dir, &archive_path).await?;

    progress.set_state(crate::progress::ProgressState::Uploading);
    let bearer_token = ctx.session.bearer_token()?;
    let upload_progress = modio_http::upload::UploadProgress::new();
    let file = FileObject::open(&archive_path, OpenMode::ReadOnly, false).await?;
    let filename = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("mod.zip")
        .to_string();

    let status = modio_http::upload::upload_modfile(
        ctx.transport.as_ref(),
        &ctx.host,
        ctx.port,
        ctx.use_tls,
        &ctx.session.api_key,
        &bearer_token,
        mod_id,
        &filename,
        &file,
        cancel,
        &upload_progress,
    )
    .await?;

    progress.set_progress(upload_progress.bytes_sent(), upload_progress.bytes_sent());

    if status.is_success() {
        FileService::new().delete_file(&archive_path).await?;
        Ok(())
    } else {
        Err(ModManagementError::UploadCancelled.into())
    }
}

async fn build_archive(source_dir: &Path, archive_path: &Path) -> Result<()> {
    let mut writer = ArchiveWriter::new();
    add_dir_to_archive(&mut writer, source_dir, source_dir)?;
    let bytes = writer.finalize();

    let out = FileObject::create(archive_path).await?;
    out.write_some(&bytes).await?;
    Ok(())
}

fn add_dir_to_archive(writer: &mut ArchiveWriter, root: &Path, dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir).map_err(|_| base_error::FilesystemError::DirectoryNotFound)? {
        let entry = entry.map_err(|_| base_error::FilesystemError::ReadError)?;
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");

        if path.is_dir() {
            writer.add_directory_entry(&relative)?;
            add_dir_to_archive(writer, root, &path)?;
        } else {
            let data = std::fs::read(&path).map_err(|_| base_error::FilesystemError::ReadError)?;
            writer.add_file_entry(&relative, &data, CompressionMethod::Deflated)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::http_ctx::test_support::{block_on, scripted_ctx, scripted_ctx_with};

    fn json_response(body: &[u8]) -> Vec<u8> {
        [format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes(), body.to_vec()].concat()
    }

    #[test]
    fn fetch_mod_profile_populates_cache_on_miss() {
        block_on(async {
            let ctx = scripted_ctx(&json_response(br#"{"id":7,"game_id":42,"metadata_blob":null,"modfile":null}"#));
            let cache = ResponseCache::new();

            let profile = fetch_mod_profile(&ctx, &cache, 7).await.unwrap();

            assert_eq!(profile.id, 7);
            assert!(cache.mod_info(7).is_some());
        });
    }

    #[test]
    fn unrecoverable_error_ref_quarantines_the_entry() {
        block_on(async {
            let body = format!(
                r#"{{"error":{{"code":404,"error_ref":{},"message":"mod removed by creator"}}}}"#,
                crate::error::UNRECOVERABLE_ERROR_REFS[0]
            );
            let ctx = scripted_ctx(
                &[format!("HTTP/1.1 404 Not Found\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes(), body.into_bytes()]
                    .concat(),
            );
            let cache = ResponseCache::new();
            let entry = Arc::new(ModCollectionEntry::new(7, ModState::InstallPending));
            let progress = crate::progress::ModProgressInfo::new(7);
            let cancel = CancellationFlag::new();
            let storage_root = tempfile::tempdir().unwrap();

            let err = download_and_extract(&ctx, &cache, storage_root.path(), &entry, &progress.handle(), &cancel)
                .await
                .unwrap_err();
            assert!(err.downcast_ref::<ApiError>().is_some());

            assert!(!entry.should_retry());
            assert!(entry.permanent_no_retry_reason.lock().unwrap().is_some());
        });
    }

    #[test]
    fn explicit_cancellation_discards_the_partial_download() {
        block_on(async {
            let profile_body =
                br#"{"id":7,"game_id":42,"metadata_blob":null,"modfile":{"id":1,"filesize":4,"download":{"binary_url":"https://api.test/file"}}}"#;
            let ctx = scripted_ctx_with(vec![json_response(profile_body), json_response(b"data")]);
            let cache = ResponseCache::new();
            let entry = Arc::new(ModCollectionEntry::new(7, ModState::InstallPending));
            let cancel = CancellationFlag::new();
            let storage_root = tempfile::tempdir().unwrap();

            // A handle whose owner is already gone models a host that
            // walked away from this install entirely before the next
            // check, as opposed to the resumable mid-transfer
            // interruption `cancel` models.
            let progress = crate::progress::ModProgressInfo::new(7);
            let handle = progress.handle();
            drop(progress);

            let err = download_and_extract(&ctx, &cache, storage_root.path(), &entry, &handle, &cancel)
                .await
                .unwrap_err();
            assert!(err.downcast_ref::<ModManagementError>().is_some());

            let archive_path = paths::mod_archive_file(storage_root.path(), 42, 7);
            let side_path = paths::download_side_file(&archive_path);
            let len = std::fs::metadata(&side_path).unwrap().len();
            assert_eq!(len, 0, "an explicitly cancelled install must not leave a resumable partial file");
        });
    }

    #[test]
    fn fetch_mod_profile_serves_cache_hit_without_a_request() {
        block_on(async {
            // No scripted response at all: a cache miss would panic trying
            // to pop one.
            let ctx = scripted_ctx(b"");
            let cache = ResponseCache::new();
            cache.set_mod_info(7, serde_json::json!({"id": 7, "game_id": 42, "metadata_blob": null, "modfile": null}));

            let profile = fetch_mod_profile(&ctx, &cache, 7).await.unwrap();

            assert_eq!(profile.id, 7);
            assert_eq!(profile.game_id, 42);
        });
    }
}
