//! Request construction. Grounded on the teacher's `http::request`
//! `RequestBuilder` (consuming `self`, one `with`-style setter per
//! concern), generalized with the default headers and query parameters
//! the mod.io API requires on every call (spec §4.5).

use crate::headers::Headers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

pub struct MultipartPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

pub enum Body {
    Empty,
    Bytes(Vec<u8>),
    UrlEncoded(Vec<(String, String)>),
    Multipart { boundary: String, parts: Vec<MultipartPart> },
}

impl Body {
    pub fn serialize(&self) -> (Option<String>, Vec<u8>) {
        match self {
            Body::Empty => (None, Vec::new()),
            Body::Bytes(data) => (None, data.clone()),
            Body::UrlEncoded(fields) => {
                let encoded = serde_urlencoded::to_string(fields).unwrap_or_default();
                (
                    Some("application/x-www-form-urlencoded".to_string()),
                    encoded.into_bytes(),
                )
            }
            Body::Multipart { boundary, parts } => {
                let mut out = Vec::new();
                for part in parts {
                    out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
                    let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
                    if let Some(filename) = &part.filename {
                        disposition.push_str(&format!("; filename=\"{}\"", filename));
                    }
                    out.extend_from_slice(disposition.as_bytes());
                    out.extend_from_slice(b"\r\n");
                    if let Some(content_type) = &part.content_type {
                        out.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
                    }
                    out.extend_from_slice(b"\r\n");
                    out.extend_from_slice(&part.data);
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
                (
                    Some(format!("multipart/form-data; boundary={}", boundary)),
                    out,
                )
            }
        }
    }
}

pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Headers,
    pub body: Body,
    pub cacheable: bool,
}

pub struct RequestBuilder {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Headers,
    body: Body,
    cacheable: bool,
}

impl RequestBuilder {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Headers::new(),
            body: Body::Empty,
            cacheable: true,
        }
    }

    /// Opts a GET out of the response cache's URL cache (spec §4.5 step
    /// 2/8: "if caching is allowed"). Used by callers that maintain
    /// their own cache with a different invalidation contract, like the
    /// mod-info cache, so the two caches never serve each other stale
    /// data.
    pub fn no_cache(mut self) -> Self {
        self.cacheable = false;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_api_key(self, api_key: &str) -> Self {
        self.with_query("api_key", api_key)
    }

    pub fn with_bearer_token(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {}", token))
    }

    pub fn with_platform(self, platform: &str) -> Self {
        self.with_header("x-modio-platform", platform)
    }

    pub fn with_portal(self, portal: &str) -> Self {
        self.with_header("x-modio-portal", portal)
    }

    pub fn with_locale(self, locale: &str) -> Self {
        self.with_header("Accept-Language", locale)
    }

    /// Sets a `Range: bytes=<start>-<end>` header; an open-ended range
    /// when `end` is `None`, used to resume an interrupted download
    /// (spec §4.5).
    pub fn with_range(self, start: u64, end: Option<u64>) -> Self {
        let value = match end {
            Some(end) => format!("bytes={}-{}", start, end),
            None => format!("bytes={}-", start),
        };
        self.with_header("Range", value)
    }

    /// Sets a `Content-Range: bytes <start>-<end>/<total>` header for a
    /// multipart upload window (spec §4.5).
    pub fn with_content_range(self, start: u64, end: u64, total: u64) -> Self {
        self.with_header("Content-Range", format!("bytes {}-{}/{}", start, end, total))
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Request {
        Request {
            method: self.method,
            path: self.path,
            query: self.query,
            headers: self.headers,
            body: self.body,
            cacheable: self.cacheable,
        }
    }
}
