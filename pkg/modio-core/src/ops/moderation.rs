//! User moderation (spec's original SDK surface): muting other users
//! and reporting content. Simple POST/GET composers against session
//! data; no local state to reconcile.

use serde::Deserialize;

use base_error::Result;
use modio_http::{Body, Method};

use crate::ops::http_ctx::HttpContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportResourceType {
    Game,
    Mod,
    User,
}

impl ReportResourceType {
    fn as_str(self) -> &'static str {
        match self {
            ReportResourceType::Game => "games",
            ReportResourceType::Mod => "mods",
            ReportResourceType::User => "users",
        }
    }
}

pub async fn mute_user(ctx: &HttpContext, user_id: u64) -> Result<()> {
    let path = format!("/v1/users/{}/mute", user_id);
    let request = ctx.authenticated_request(Method::Post, path)?.build();
    ctx.send(request).await?;
    Ok(())
}

pub async fn unmute_user(ctx: &HttpContext, user_id: u64) -> Result<()> {
    let path = format!("/v1/users/{}/mute", user_id);
    let request = ctx.authenticated_request(Method::Delete, path)?.build();
    ctx.send(request).await?;
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct MutedUser {
    pub id: u64,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
struct MutedUsersPage {
    data: Vec<MutedUser>,
}

pub async fn get_muted_users(ctx: &HttpContext) -> Result<Vec<MutedUser>> {
    let request = ctx.authenticated_request(Method::Get, "/v1/users/muted")?.build();
    let response = ctx.send(request).await?;
    let page: MutedUsersPage = response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse)?;
    Ok(page.data)
}

pub async fn report_content(
    ctx: &HttpContext,
    resource: ReportResourceType,
    resource_id: u64,
    reason_code: u32,
    summary: &str,
) -> Result<()> {
    let request = ctx
        .authenticated_request(Method::Post, "/v1/report")?
        .with_body(Body::UrlEncoded(vec![
            ("resource".to_string(), resource.as_str().to_string()),
            ("id".to_string(), resource_id.to_string()),
            ("type".to_string(), reason_code.to_string()),
            ("summary".to_string(), summary.to_string()),
        ]))
        .build();
    ctx.send(request).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::http_ctx::test_support::{block_on, scripted_ctx};

    #[test]
    fn mute_user_sends_authenticated_post() {
        block_on(async {
            let ctx = scripted_ctx(b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n");
            mute_user(&ctx, 7).await.unwrap();
        });
    }

    #[test]
    fn get_muted_users_parses_page() {
        block_on(async {
            let body: &[u8] = br#"{"data":[{"id":7,"username":"grief"}]}"#;
            let response = [
                format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes(),
                body.to_vec(),
            ]
            .concat();
            let ctx = scripted_ctx(&response);
            let users = get_muted_users(&ctx).await.unwrap();
            assert_eq!(users.len(), 1);
            assert_eq!(users[0].username, "grief");
        });
    }
}
