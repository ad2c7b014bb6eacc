//! Authentication (spec §4.9): external-provider login, the email
//! one-time-code flow, and the "clear the user-scoped store when the
//! authenticated user changes" rule every entry point into this module
//! must honor.

use serde::Deserialize;

use base_error::Result;
use modio_http::{Body, Method};

use crate::cache::ResponseCache;
use crate::mod_collection::ModCollection;
use crate::ops::http_ctx::HttpContext;
use crate::persisted::PersistedUserMetadata;
use crate::session::{OAuthToken, TokenStatus};

/// Third-party identity providers the API accepts a token from. Each
/// variant picks the endpoint and the provider-specific token field
/// name; everything past that is the same generic exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalAuthProvider {
    Steam,
    Apple,
    Discord,
    Epic,
    Gog,
    GoogleIdToken,
    Oculus,
    OpenId,
    Psn,
    XboxLive,
}

impl ExternalAuthProvider {
    fn path(self) -> &'static str {
        match self {
            ExternalAuthProvider::Steam => "/v1/authenticate/steam",
            ExternalAuthProvider::Apple => "/v1/authenticate/apple",
            ExternalAuthProvider::Discord => "/v1/authenticate/discord",
            ExternalAuthProvider::Epic => "/v1/authenticate/epicgames",
            ExternalAuthProvider::Gog => "/v1/authenticate/gog",
            ExternalAuthProvider::GoogleIdToken => "/v1/authenticate/google",
            ExternalAuthProvider::Oculus => "/v1/authenticate/oculus",
            ExternalAuthProvider::OpenId => "/v1/authenticate/openid",
            ExternalAuthProvider::Psn => "/v1/authenticate/psn",
            ExternalAuthProvider::XboxLive => "/v1/authenticate/xboxlive",
        }
    }

    fn token_field(self) -> &'static str {
        match self {
            ExternalAuthProvider::Steam => "appdata",
            ExternalAuthProvider::Apple => "id_token",
            ExternalAuthProvider::Discord => "discord_token",
            ExternalAuthProvider::Epic => "epicgames_sso_token",
            ExternalAuthProvider::Gog => "gog_auth_code",
            ExternalAuthProvider::GoogleIdToken => "id_token",
            ExternalAuthProvider::Oculus => "nonce",
            ExternalAuthProvider::OpenId => "id_token",
            ExternalAuthProvider::Psn => "auth_code",
            ExternalAuthProvider::XboxLive => "xbox_token",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatedUser {
    pub id: u64,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    date_expires: Option<i64>,
}

/// Fetches `/v1/me` with a freshly minted bearer token, installs the
/// session, and wipes every piece of user-scoped state if the
/// authenticated user changed (spec §4.9).
async fn finish_login(
    ctx: &HttpContext,
    collection: &ModCollection,
    cache: &mut ResponseCache,
    token: TokenResponse,
) -> Result<AuthenticatedUser> {
    let user_request = ctx
        .request(Method::Get, "/v1/me")
        .with_header("Authorization", format!("Bearer {}", token.access_token))
        .build();
    let user_response = ctx.send(user_request).await?;
    let user: AuthenticatedUser =
        user_response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse)?;

    let previous_user = ctx.session.authenticated_user_id();
    if previous_user.is_some() && previous_user != Some(user.id) {
        for entry in collection.all() {
            collection.remove(entry.id);
        }
        cache.clear();
    }

    ctx.session.set_authenticated_user(
        user.id,
        OAuthToken {
            token: token.access_token,
            expiry: token.date_expires.unwrap_or(i64::MAX),
            status: TokenStatus::Valid,
        },
    );

    Ok(user)
}

/// Exchanges a third-party provider token for a mod.io session (spec
/// §4.9).
pub async fn authenticate_external(
    ctx: &HttpContext,
    collection: &ModCollection,
    cache: &mut ResponseCache,
    provider: ExternalAuthProvider,
    provider_token: &str,
    email: Option<&str>,
) -> Result<AuthenticatedUser> {
    let mut fields = vec![(provider.token_field().to_string(), provider_token.to_string())];
    if let Some(email) = email {
        fields.push(("email".to_string(), email.to_string()));
    }

    let request = ctx.request(Method::Post, provider.path()).with_body(Body::UrlEncoded(fields)).build();
    let response = ctx.send(request).await?;
    let token: TokenResponse = response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse)?;

    finish_login(ctx, collection, cache, token).await
}

/// Requests a one-time email login code be sent to `email` (spec
/// §4.9's email flow).
pub async fn request_email_code(ctx: &HttpContext, email: &str) -> Result<()> {
    let request = ctx
        .request(Method::Post, "/v1/oauth/emailrequest")
        .with_body(Body::UrlEncoded(vec![("email".to_string(), email.to_string())]))
        .build();
    ctx.send(request).await?;
    Ok(())
}

/// Exchanges an emailed one-time code for a session, the same way
/// `authenticate_external` does for a third-party token.
pub async fn exchange_email_code(
    ctx: &HttpContext,
    collection: &ModCollection,
    cache: &mut ResponseCache,
    email: &str,
    code: &str,
) -> Result<AuthenticatedUser> {
    let request = ctx
        .request(Method::Post, "/v1/oauth/emailexchange")
        .with_body(Body::UrlEncoded(vec![
            ("email".to_string(), email.to_string()),
            ("security_code".to_string(), code.to_string()),
        ]))
        .build();
    let response = ctx.send(request).await?;
    let token: TokenResponse = response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse)?;

    finish_login(ctx, collection, cache, token).await
}

/// Fetches the mod.io terms of use text, shown to the player before
/// their first external-provider login (spec's original SDK surface).
pub async fn get_terms_of_use(ctx: &HttpContext) -> Result<String> {
    let request = ctx.request(Method::Get, "/v1/authenticate/terms").build();
    let response = ctx.send(request).await?;
    Ok(String::from_utf8_lossy(&response.body).into_owned())
}

/// Persists the freshly authenticated user's metadata document so a
/// later process restart finds the session without re-authenticating
/// (spec §6).
pub async fn persist_user_metadata(
    storage_root: &std::path::Path,
    game_id: u64,
    user_id: u64,
    metadata: &PersistedUserMetadata,
) -> Result<()> {
    let path = modio_file::paths::user_metadata_file(storage_root, game_id, user_id);
    let json = metadata.to_json().map_err(|_| base_error::GenericError::CouldNotCreateHandle)?;
    let file = modio_file::FileObject::create(&path).await?;
    file.write_some(json.as_bytes()).await?;
    Ok(())
}
