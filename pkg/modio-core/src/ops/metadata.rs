//! Mod-metadata mutation (spec §4.6 invariant 6: "a mutating call
//! invalidates the mod-info cache entry before the next `get_mod_info`
//! can observe it"). Every op below is a thin request composer that
//! calls [`ResponseCache::invalidate_mod_info`] on success, the same
//! rule `ops::mods`'s collection mutations already honor for local
//! state.

use serde::Deserialize;

use base_error::Result;
use modio_http::{Body, Method};

use crate::cache::ResponseCache;
use crate::ops::http_ctx::HttpContext;

/// A field edit to an existing mod's profile. `None` leaves a field
/// untouched; only `Some` fields are sent.
#[derive(Debug, Clone, Default)]
pub struct ModChanges {
    pub name: Option<String>,
    pub summary: Option<String>,
    pub visible: Option<bool>,
}

impl ModChanges {
    fn into_fields(self) -> Vec<(String, String)> {
        let mut fields = Vec::new();
        if let Some(name) = self.name {
            fields.push(("name".to_string(), name));
        }
        if let Some(summary) = self.summary {
            fields.push(("summary".to_string(), summary));
        }
        if let Some(visible) = self.visible {
            fields.push(("visible".to_string(), if visible { "1".to_string() } else { "0".to_string() }));
        }
        fields
    }
}

pub async fn submit_mod_changes(
    ctx: &HttpContext,
    cache: &ResponseCache,
    mod_id: u64,
    changes: ModChanges,
) -> Result<()> {
    let path = format!("/v1/games/{}/mods/{}", ctx.session.game_id, mod_id);
    let request = ctx
        .authenticated_request(Method::Put, path)?
        .with_body(Body::UrlEncoded(changes.into_fields()))
        .build();
    ctx.send(request).await?;
    cache.invalidate_mod_info(mod_id);
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewModProfile {
    pub name: String,
    pub summary: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedMod {
    pub id: u64,
}

pub async fn submit_new_mod(ctx: &HttpContext, profile: NewModProfile) -> Result<CreatedMod> {
    let path = format!("/v1/games/{}/mods", ctx.session.game_id);
    let fields = vec![
        ("name".to_string(), profile.name),
        ("summary".to_string(), profile.summary),
        ("visible".to_string(), if profile.visible { "1".to_string() } else { "0".to_string() }),
    ];
    let request = ctx.authenticated_request(Method::Post, path)?.with_body(Body::UrlEncoded(fields)).build();
    let response = ctx.send(request).await?;
    response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse.into())
}

#[derive(Debug, Clone, Deserialize)]
struct TagsPage {
    data: Vec<ModTagOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModTagOption {
    pub name: String,
    pub tags: Vec<String>,
}

pub async fn get_mod_tags(ctx: &HttpContext, mod_id: u64) -> Result<Vec<ModTagOption>> {
    let path = format!("/v1/games/{}/mods/{}/tags", ctx.session.game_id, mod_id);
    let request = ctx.request(Method::Get, path).build();
    let response = ctx.send(request).await?;
    let page: TagsPage = response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse)?;
    Ok(page.data)
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModDependency {
    pub mod_id: u64,
    pub date_added: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct DependenciesPage {
    data: Vec<ModDependency>,
}

pub async fn get_mod_dependencies(ctx: &HttpContext, mod_id: u64) -> Result<Vec<ModDependency>> {
    let path = format!("/v1/games/{}/mods/{}/dependencies", ctx.session.game_id, mod_id);
    let request = ctx.request(Method::Get, path).build();
    let response = ctx.send(request).await?;
    let page: DependenciesPage = response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse)?;
    Ok(page.data)
}

/// Archives (soft-deletes) a mod. Still invalidates the mod-info cache:
/// an archived mod's profile reports a different status on next fetch.
pub async fn archive_mod(ctx: &HttpContext, cache: &ResponseCache, mod_id: u64) -> Result<()> {
    let path = format!("/v1/games/{}/mods/{}", ctx.session.game_id, mod_id);
    let request = ctx.authenticated_request(Method::Delete, path)?.build();
    ctx.send(request).await?;
    cache.invalidate_mod_info(mod_id);
    Ok(())
}
