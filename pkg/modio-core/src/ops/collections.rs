//! Mod collections (a.k.a. community playlists): a collection groups
//! an arbitrary set of mods under one id, distinct from any single
//! mod's id. Follow/subscribe mirror the same two-tier membership
//! split `ops::mods::subscribe`/`unsubscribe` uses for individual mods,
//! but collections carry no local on-disk reconciliation state of
//! their own — a collection is metadata and a list of mod ids, not
//! something installed.

use serde::Deserialize;

use base_error::Result;
use modio_http::Method;

use crate::ops::http_ctx::HttpContext;

#[derive(Debug, Clone, Deserialize)]
pub struct ModCollectionInfo {
    pub id: u64,
    pub name: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ModCollectionPage {
    data: Vec<ModCollectionInfo>,
}

pub async fn follow_mod_collection(ctx: &HttpContext, collection_id: u64) -> Result<()> {
    let path = format!("/v1/collections/{}/follow", collection_id);
    let request = ctx.authenticated_request(Method::Post, path)?.build();
    ctx.send(request).await?;
    Ok(())
}

pub async fn unfollow_mod_collection(ctx: &HttpContext, collection_id: u64) -> Result<()> {
    let path = format!("/v1/collections/{}/follow", collection_id);
    let request = ctx.authenticated_request(Method::Delete, path)?.build();
    ctx.send(request).await?;
    Ok(())
}

pub async fn subscribe_to_mod_collection(ctx: &HttpContext, collection_id: u64) -> Result<()> {
    let path = format!("/v1/collections/{}/subscribe", collection_id);
    let request = ctx.authenticated_request(Method::Post, path)?.build();
    ctx.send(request).await?;
    Ok(())
}

pub async fn unsubscribe_from_mod_collection(ctx: &HttpContext, collection_id: u64) -> Result<()> {
    let path = format!("/v1/collections/{}/subscribe", collection_id);
    let request = ctx.authenticated_request(Method::Delete, path)?.build();
    ctx.send(request).await?;
    Ok(())
}

pub async fn list_mod_collections(ctx: &HttpContext) -> Result<Vec<ModCollectionInfo>> {
    let path = format!("/v1/games/{}/collections", ctx.session.game_id);
    let request = ctx.request(Method::Get, path).build();
    let response = ctx.send(request).await?;
    let page: ModCollectionPage = response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse)?;
    Ok(page.data)
}

pub async fn list_user_followed_mod_collections(ctx: &HttpContext) -> Result<Vec<ModCollectionInfo>> {
    let request = ctx.authenticated_request(Method::Get, "/v1/me/collections/follows")?.build();
    let response = ctx.send(request).await?;
    let page: ModCollectionPage = response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse)?;
    Ok(page.data)
}

pub async fn get_mod_collection_info(ctx: &HttpContext, collection_id: u64) -> Result<ModCollectionInfo> {
    let path = format!("/v1/collections/{}", collection_id);
    let request = ctx.request(Method::Get, path).build();
    let response = ctx.send(request).await?;
    response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse.into())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModCollectionEntryInfo {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct ModCollectionModsPage {
    data: Vec<ModCollectionEntryInfo>,
}

pub async fn get_mod_collection_mods(ctx: &HttpContext, collection_id: u64) -> Result<Vec<ModCollectionEntryInfo>> {
    let path = format!("/v1/collections/{}/mods", collection_id);
    let request = ctx.request(Method::Get, path).build();
    let response = ctx.send(request).await?;
    let page: ModCollectionModsPage = response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse)?;
    Ok(page.data)
}

pub async fn submit_mod_collection_rating(ctx: &HttpContext, collection_id: u64, rating: i32) -> Result<()> {
    let path = format!("/v1/collections/{}/ratings", collection_id);
    let request = ctx
        .authenticated_request(Method::Post, path)?
        .with_body(modio_http::Body::UrlEncoded(vec![("rating".to_string(), rating.to_string())]))
        .build();
    ctx.send(request).await?;
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
    fn lists_followed_collections() {
        block_on(async {
            let body = br#"{"data":[{"id":5,"name":"Essentials","summary":null}]}"#;
            let ctx = scripted_ctx(&json_response(body));
            let collections = list_user_followed_mod_collections(&ctx).await.unwrap();
            assert_eq!(collections.len(), 1);
            assert_eq!(collections[0].name, "Essentials");
        });
    }

    #[test]
    fn follow_then_unfollow_round_trip() {
        block_on(async {
            let ctx = scripted_ctx_with(vec![
                b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n".to_vec(),
                b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n".to_vec(),
            ]);
            follow_mod_collection(&ctx, 5).await.unwrap();
            unfollow_mod_collection(&ctx, 5).await.unwrap();
        });
    }
}
