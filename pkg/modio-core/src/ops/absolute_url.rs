//! Splits an absolute `https://host[:port]/path` URL into the
//! components a [`Transport`](modio_http::Transport) connects with.
//! Several resources the API hands back — mod file downloads, logos,
//! gallery images, avatars — are served from a CDN host distinct from
//! the API host an [`HttpContext`](crate::ops::http_ctx::HttpContext)
//! is bound to, so every one of those fetches needs to parse its own
//! destination rather than reuse the context's.

use base_error::{HttpError, Result};

pub struct AbsoluteUrl {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub path: String,
}

impl AbsoluteUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let (use_tls, rest) = if let Some(rest) = url.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            (false, rest)
        } else {
            return Err(HttpError::InvalidResponse.into());
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (host.to_string(), port.parse().map_err(|_| HttpError::InvalidResponse)?),
            None => (authority.to_string(), if use_tls { 443 } else { 80 }),
        };

        if host.is_empty() {
            return Err(HttpError::InvalidResponse.into());
        }

        Ok(Self { host, port, use_tls, path: path.to_string() })
    }
}
