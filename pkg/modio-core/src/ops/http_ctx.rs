//! Shared plumbing every composed operation in `ops` needs: building a
//! request pre-filled with the session's credentials and sending it
//! through the standard redirect/error-classification pipeline (spec
//! §4.5, §4.9).

use std::sync::Arc;

use base_error::{ApiError, HttpError, Result};
use modio_executor::Executor;
use modio_http::{Headers, Method, Request, RequestBuilder, Response, StatusCode};
use modio_http::{send_with_redirects, Transport};

use crate::cache::{url_cache_key, ResponseCache, DEFAULT_TTL};
use crate::error::{classify, Classification};
use crate::session::SessionData;

/// Everything a composed operation needs to reach the API: the
/// transport, where it points, the session it authenticates with, and
/// the response cache/executor `send` uses to serve and populate the
/// URL cache (spec §4.5 steps 2 & 8). Cheap to clone (`Arc` handles plus
/// scalar fields), the way `SessionData` itself is.
#[derive(Clone)]
pub struct HttpContext {
    pub transport: Arc<dyn Transport>,
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub allowed_hosts: Vec<String>,
    pub session: Arc<SessionData>,
    pub cache: ResponseCache,
    pub executor: Arc<Executor>,
}

/// The fully-formatted resource path the URL cache keys on (spec §4.6):
/// the path plus every query parameter, including `api_key`.
fn cache_key_for(request: &Request) -> u32 {
    let query: String = request.query.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join("&");
    url_cache_key(&format!("{}?{}", request.path, query))
}

impl HttpContext {
    /// A request builder pre-filled with the fields the API requires on
    /// every call.
    pub fn request(&self, method: Method, path: impl Into<String>) -> RequestBuilder {
        let mut builder = RequestBuilder::new(method, path)
            .with_api_key(&self.session.api_key)
            .with_portal(&self.session.portal)
            .with_locale(&self.session.locale);
        if let Some(platform) = &self.session.platform_override {
            builder = builder.with_platform(platform);
        }
        builder
    }

    /// An authenticated request builder; fails up front if there is no
    /// usable token rather than sending a request the API will reject.
    pub fn authenticated_request(&self, method: Method, path: impl Into<String>) -> Result<RequestBuilder> {
        let token = self.session.bearer_token()?;
        Ok(self.request(method, path).with_bearer_token(&token))
    }

    /// Sends a request through the redirect pipeline and classifies the
    /// result per spec §4.5: a non-2xx response is inspected for the
    /// rate-limit `error_ref` (sets the session flag) and the
    /// success-no-op family (reported as `Ok`) before surfacing anything
    /// else as a structured `ApiError`. A cacheable GET consults the URL
    /// cache before sending (step 2) and populates it on a 2xx (step 8);
    /// a caller with its own invalidation contract (the mod-info cache)
    /// opts out via `RequestBuilder::no_cache`.
    pub async fn send(&self, request: Request) -> Result<Response> {
        let cache_key = (request.method == Method::Get && request.cacheable).then(|| cache_key_for(&request));

        if let Some(key) = cache_key {
            if let Some(body) = self.cache.fetch(key) {
                return Ok(Response { status: StatusCode(200), headers: Headers::new(), body: (*body).clone() });
            }
        }

        let response =
            send_with_redirects(self.transport.as_ref(), &self.host, self.port, self.use_tls, request, &self.allowed_hosts)
                .await?;

        if response.status.is_success() {
            self.session.set_rate_limited(false);
            if let Some(key) = cache_key {
                self.cache.insert(&self.executor, key, response.body.clone(), DEFAULT_TTL);
            }
            return Ok(response);
        }

        let body = response.error_body().ok_or(HttpError::InvalidResponse)?;
        match classify(&body) {
            Classification::SuccessNoOp => {
                self.session.set_rate_limited(false);
                Ok(response)
            }
            Classification::RateLimited => {
                self.session.set_rate_limited(true);
                Err(ApiError::RateLimited.into())
            }
            Classification::Api(err) => {
                self.session.set_rate_limited(false);
                self.session.set_last_validation_error(err.to_string());
                Err(err.into())
            }
        }
    }
}
