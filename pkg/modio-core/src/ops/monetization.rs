//! Monetization surface: checking and consuming a user's entitlements,
//! wallet balance, and the delegation token third-party storefronts
//! need to validate a purchase server-side. Entitlement consumption is
//! eventually consistent on the API side; a 409 means "not settled
//! yet, retry" rather than a hard failure (`MonetizationError::RetryEntitlements`,
//! spec §4.7).

use serde::Deserialize;

use base_error::{MonetizationError, Result};
use modio_http::{Body, Method};

use crate::ops::http_ctx::HttpContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementPlatform {
    Google,
    Psn,
    Steam,
}

impl EntitlementPlatform {
    fn refresh_path(self) -> &'static str {
        match self {
            EntitlementPlatform::Google => "/v1/me/entitlements/google/refresh",
            EntitlementPlatform::Psn => "/v1/me/entitlements/psn/refresh",
            EntitlementPlatform::Steam => "/v1/me/entitlements/steam/refresh",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserEntitlement {
    pub sku: String,
    pub quantity: u32,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct EntitlementsPage {
    data: Vec<UserEntitlement>,
}

pub async fn get_available_user_entitlements(ctx: &HttpContext) -> Result<Vec<UserEntitlement>> {
    let request = ctx.authenticated_request(Method::Get, "/v1/me/entitlements")?.build();
    let response = ctx.send(request).await?;
    let page: EntitlementsPage = response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse)?;
    Ok(page.data)
}

/// Asks the API to reconcile a platform's entitlement ledger against
/// what the storefront reports. A `409` means the storefront's side
/// hasn't settled the transaction yet; callers should surface
/// [`MonetizationError::RetryEntitlements`] and retry after a backoff
/// rather than treating it as failure.
pub async fn refresh_user_entitlements(
    ctx: &HttpContext,
    platform: EntitlementPlatform,
    transaction_ids: &[String],
) -> Result<Vec<UserEntitlement>> {
    let fields = transaction_ids.iter().map(|id| ("transaction_id[]".to_string(), id.clone())).collect();
    let request = ctx
        .authenticated_request(Method::Post, platform.refresh_path())?
        .with_body(Body::UrlEncoded(fields))
        .build();

    let response = match ctx.send(request).await {
        Ok(response) => response,
        Err(err) => {
            if let Some(api_err) = err.downcast_ref::<base_error::ApiError>() {
                if api_err.code() == Some(409) {
                    return Err(MonetizationError::RetryEntitlements.into());
                }
            }
            return Err(err);
        }
    };

    let page: EntitlementsPage = response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse)?;
    Ok(page.data)
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletBalance {
    pub balance: u64,
}

pub async fn get_user_wallet_balance(ctx: &HttpContext) -> Result<WalletBalance> {
    let request = ctx.authenticated_request(Method::Get, "/v1/me/wallet")?.build();
    let response = ctx.send(request).await?;
    response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse.into())
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelegationToken {
    pub token: String,
}

/// Fetches a short-lived token a storefront can redeem server-side to
/// validate a purchase was made by this authenticated user.
pub async fn get_user_delegation_token(ctx: &HttpContext) -> Result<DelegationToken> {
    let request = ctx.authenticated_request(Method::Get, "/v1/me/entitlements/delegation")?.build();
    let response = ctx.send(request).await?;
    response.body_as_json().map_err(|_| base_error::HttpError::InvalidResponse.into())
}
