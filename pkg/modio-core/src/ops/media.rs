//! Avatar and gallery image fetch-and-cache (spec §4.2, §6: the
//! `cache/mods/<id>/logos`, `cache/mods/<id>/gallery/<index>`, and
//! `cache/users/<id>/avatars` paths). Each image is fetched once per
//! size tag and kept on disk indefinitely; callers needing a fresh copy
//! delete the cached file first.

use std::path::Path;

use base_error::Result;
use modio_file::{paths, FileObject, FileService};
use modio_http::{send_with_redirects, Method, RequestBuilder};

use crate::ops::absolute_url::AbsoluteUrl;
use crate::ops::http_ctx::HttpContext;

/// Fetches `url` and writes it to `dest`, skipping the request entirely
/// if it's already cached. Image URLs (logos, gallery images, avatars)
/// are served from a CDN host distinct from the API host `ctx` is bound
/// to, so this connects directly to the parsed URL rather than going
/// through `ctx.send`.
async fn fetch_and_cache(ctx: &HttpContext, url: &str, dest: &Path) -> Result<()> {
    if FileService::new().file_exists(dest).await {
        return Ok(());
    }

    let parsed = AbsoluteUrl::parse(url)?;
    let request = RequestBuilder::new(Method::Get, parsed.path).build();
    let response =
        send_with_redirects(ctx.transport.as_ref(), &parsed.host, parsed.port, parsed.use_tls, request, &ctx.allowed_hosts)
            .await?;

    let file = FileObject::create(dest).await?;
    file.write_some(&response.body).await?;
    Ok(())
}

/// Downloads a mod's logo at `size_tag` into the cache, unless already
/// present there.
pub async fn get_mod_logo(
    ctx: &HttpContext,
    storage_root: &Path,
    mod_id: u64,
    logo_url: &str,
    size_tag: &str,
) -> Result<std::path::PathBuf> {
    let dest = paths::mod_logo_file(storage_root, ctx.session.game_id, mod_id, size_tag);
    fetch_and_cache(ctx, logo_url, &dest).await?;
    Ok(dest)
}

/// Downloads one gallery image for a mod at `index`/`size_tag`.
pub async fn get_mod_gallery_image(
    ctx: &HttpContext,
    storage_root: &Path,
    mod_id: u64,
    index: usize,
    image_url: &str,
    size_tag: &str,
) -> Result<std::path::PathBuf> {
    let dest = paths::mod_gallery_file(storage_root, ctx.session.game_id, mod_id, index, size_tag);
    fetch_and_cache(ctx, image_url, &dest).await?;
    Ok(dest)
}

/// Downloads a user's avatar at `size_tag`.
pub async fn get_user_avatar(
    ctx: &HttpContext,
    storage_root: &Path,
    user_id: u64,
    avatar_url: &str,
    size_tag: &str,
) -> Result<std::path::PathBuf> {
    let dest = paths::user_avatar_file(storage_root, ctx.session.game_id, user_id, size_tag);
    fetch_and_cache(ctx, avatar_url, &dest).await?;
    Ok(dest)
}
