//! The request/response send loop: wire serialization, response parsing,
//! and redirect following. Grounded on the teacher's `http::client_ref.rs`
//! send loop, trimmed of its `LoadBalancedClient`/`Resolver`/
//! `ExponentialBackoff` machinery (this crate has exactly one upstream
//! host per game, derived by `uri::server_host`, so there is nothing to
//! load-balance or resolve) but keeping its shape: serialize, connect,
//! write, read headers, follow redirects against a host allowlist.

use base_error::{HttpError, Result};
use modio_common::io::{Readable, Writeable};

use crate::headers::Headers;
use crate::request::Request;
use crate::response::Response;
use crate::status::StatusCode;
use crate::transport::Transport;

/// A redirect chain longer than this is treated as a misconfigured or
/// hostile server, not a legitimate multi-hop redirect (spec §4.5).
pub const MAX_REDIRECTS: u32 = 8;

pub(crate) fn serialize_request(request: &Request, host: &str) -> Vec<u8> {
    let mut path = request.path.clone();
    if !request.query.is_empty() {
        let qs = serde_urlencoded::to_string(&request.query).unwrap_or_default();
        path.push('?');
        path.push_str(&qs);
    }

    let (content_type, body) = request.body.serialize();

    let mut out = format!("{} {} HTTP/1.1\r\n", request.method.as_str(), path).into_bytes();
    out.extend_from_slice(format!("Host: {}\r\n", host).as_bytes());
    for (name, value) in request.headers.iter() {
        out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
    }
    if let Some(content_type) = content_type {
        out.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
    }
    out.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    out.extend_from_slice(b"Connection: close\r\n\r\n");
    out.extend_from_slice(&body);
    out
}

fn parse_status_line(line: &str) -> Result<StatusCode> {
    let mut parts = line.split_whitespace();
    let _version = parts.next().ok_or(HttpError::InvalidResponse)?;
    let code: u16 = parts
        .next()
        .ok_or(HttpError::InvalidResponse)?
        .parse()
        .map_err(|_| HttpError::InvalidResponse)?;
    Ok(StatusCode(code))
}

fn parse_header_line(line: &str) -> Option<(String, String)> {
    let idx = line.find(':')?;
    let name = line[..idx].trim().to_string();
    let value = line[idx + 1..].trim().to_string();
    Some((name, value))
}

/// Reads one HTTP/1.1 response's status line and headers off `conn`,
/// returning them along with whatever body bytes arrived in the same
/// read as the header boundary. `conn` is left open and positioned right
/// after those bytes, so a caller that wants the body streamed rather
/// than buffered whole (`download::download`) can keep reading it chunk
/// by chunk instead of going through `read_response`.
pub(crate) async fn read_response_head(conn: &mut dyn crate::transport::Connection) -> Result<(StatusCode, Headers, Vec<u8>)> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find_header_boundary(&raw) {
            break pos;
        }
        let n = conn.read(&mut buf).await?;
        if n == 0 {
            return Err(HttpError::InvalidResponse.into());
        }
        raw.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let status = parse_status_line(lines.next().ok_or(HttpError::InvalidResponse)?)?;

    let mut headers = Headers::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = parse_header_line(line) {
            headers.insert(name, value);
        }
    }

    let leftover = raw[header_end..].to_vec();
    Ok((status, headers, leftover))
}

/// Reads one full HTTP/1.1 response off `conn`: status line, headers, and
/// body (via `Content-Length` when present, otherwise read-to-EOF).
pub async fn read_response(conn: &mut dyn crate::transport::Connection) -> Result<Response> {
    let (status, headers, mut body) = read_response_head(conn).await?;
    let mut buf = [0u8; 4096];
    let content_length = headers.get("Content-Length").and_then(|v| v.parse::<usize>().ok());

    match content_length {
        Some(len) => {
            while body.len() < len {
                let n = conn.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                body.extend_from_slice(&buf[..n]);
            }
            body.truncate(len);
        }
        None => loop {
            let n = conn.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&buf[..n]);
        },
    }

    Ok(Response { status, headers, body })
}

fn find_header_boundary(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

/// Sends one request and returns the raw response, without following
/// redirects or interpreting status codes.
pub async fn send_once(transport: &dyn Transport, host: &str, port: u16, use_tls: bool, request: &Request) -> Result<Response> {
    let mut conn = transport.connect(host, port, use_tls).await?;
    let raw = serialize_request(request, host);
    conn.write_all(&raw).await?;
    conn.flush().await?;
    read_response(conn.as_mut()).await
}

/// Splits a `Location` header value into `(host, port, use_tls, path)`.
/// Only `http`/`https` absolute URLs are accepted; anything else is an
/// invalid response rather than a followable redirect.
pub(crate) fn parse_location(location: &str) -> Result<(String, u16, bool, String)> {
    let (use_tls, rest) = if let Some(rest) = location.strip_prefix("https://") {
        (true, rest)
    } else if let Some(rest) = location.strip_prefix("http://") {
        (false, rest)
    } else {
        return Err(HttpError::InvalidResponse.into());
    };

    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], rest[idx..].to_string()),
        None => (rest, "/".to_string()),
    };

    let (host, port) = match authority.split_once(':') {
        Some((h, p)) => (h.to_string(), p.parse().map_err(|_| HttpError::InvalidResponse)?),
        None => (authority.to_string(), if use_tls { 443 } else { 80 }),
    };

    Ok((host, port, use_tls, path))
}

/// Sends `request` against `host`, following redirects whose target host
/// is in `allowed_hosts`, up to `MAX_REDIRECTS` hops. A redirect to a
/// host outside the allowlist is reported as `DownloadNotPermitted` (spec
/// §4.5 scenario: a download handed off to a CDN not recognized as
/// mod.io's own).
pub async fn send_with_redirects(
    transport: &dyn Transport,
    host: &str,
    port: u16,
    use_tls: bool,
    request: Request,
    allowed_hosts: &[String],
) -> Result<Response> {
    let mut current_host = host.to_string();
    let mut current_port = port;
    let mut current_tls = use_tls;
    let mut current_request = request;

    for _ in 0..=MAX_REDIRECTS {
        let response = send_once(transport, &current_host, current_port, current_tls, &current_request).await?;

        if response.status.as_u16() == 502 {
            return Err(HttpError::ServersOverloaded.into());
        }

        if !response.status.is_redirect() {
            return Ok(response);
        }

        let location = response.header("Location").ok_or(HttpError::InvalidResponse)?;
        let (next_host, next_port, next_tls, next_path) = parse_location(location)?;

        if !allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(&next_host)) {
            return Err(HttpError::DownloadNotPermitted.into());
        }

        current_request.path = next_path;
        current_host = next_host;
        current_port = next_port;
        current_tls = next_tls;
    }

    Err(HttpError::ExcessiveRedirects.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Body, Method, RequestBuilder};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll, Wake, Waker};

    struct NoopWake;
    impl Wake for NoopWake {
        fn wake(self: Arc<Self>) {}
    }

    fn block_on<F: Future>(mut fut: F) -> F::Output {
        let waker = Waker::from(Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let mut fut = unsafe { std::pin::Pin::new_unchecked(&mut fut) };
        loop {
            if let Poll::Ready(v) = fut.as_mut().poll(&mut cx) {
                return v;
            }
        }
    }

    struct ScriptedConnection {
        chunks: VecDeque<Vec<u8>>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    #[async_trait]
    impl Readable for ScriptedConnection {
        async fn read(&mut self, output: &mut [u8]) -> Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(output.len());
                    output[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => Ok(0),
            }
        }
    }

    #[async_trait]
    impl Writeable for ScriptedConnection {
        async fn write(&mut self, data: &[u8]) -> Result<usize> {
            self.written.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }
    }

    impl crate::transport::Connection for ScriptedConnection {}

    struct ScriptedTransport {
        responses: Mutex<VecDeque<Vec<u8>>>,
        written: Arc<Mutex<Vec<u8>>>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn connect(&self, _host: &str, _port: u16, _use_tls: bool) -> Result<Box<dyn crate::transport::Connection>> {
            let raw = self.responses.lock().unwrap().pop_front().expect("scripted response");
            Ok(Box::new(ScriptedConnection {
                chunks: VecDeque::from(vec![raw]),
                written: self.written.clone(),
            }))
        }
    }

    #[test]
    fn serializes_method_path_and_headers() {
        let request = RequestBuilder::new(Method::Get, "/v1/games/42/mods")
            .with_api_key("key")
            .with_bearer_token("tok")
            .build();
        let raw = serialize_request(&request, "g-42.modapi.io");
        let text = String::from_utf8(raw).unwrap();
        assert!(text.starts_with("GET /v1/games/42/mods?api_key=key HTTP/1.1\r\n"));
        assert!(text.contains("Host: g-42.modapi.io\r\n"));
        assert!(text.contains("Authorization: Bearer tok\r\n"));
        assert!(text.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn reads_status_headers_and_body_by_content_length() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 13\r\n\r\n{\"id\":7}extra".to_vec();
        let transport = ScriptedTransport {
            responses: Mutex::new(VecDeque::from(vec![raw])),
            written: Arc::new(Mutex::new(Vec::new())),
        };
        let request = RequestBuilder::new(Method::Get, "/v1/games/42/mods/7").build();
        let response = block_on(send_once(&transport, "host", 443, true, &request)).unwrap();
        assert_eq!(response.status, StatusCode(200));
        assert_eq!(response.body.len(), 13);
    }

    #[test]
    fn follows_redirect_to_allowed_host_then_returns_final_response() {
        let redirect = b"HTTP/1.1 302 Found\r\nLocation: https://cdn.mod.io/file.zip\r\nContent-Length: 0\r\n\r\n".to_vec();
        let final_response = b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndata".to_vec();
        let transport = ScriptedTransport {
            responses: Mutex::new(VecDeque::from(vec![redirect, final_response])),
            written: Arc::new(Mutex::new(Vec::new())),
        };
        let request = RequestBuilder::new(Method::Get, "/v1/games/42/mods/7/files/9/download").build();
        let allowed = vec!["cdn.mod.io".to_string()];
        let response = block_on(send_with_redirects(&transport, "g-42.modapi.io", 443, true, request, &allowed)).unwrap();
        assert_eq!(response.status, StatusCode(200));
        assert_eq!(response.body, b"data");
    }

    #[test]
    fn redirect_to_disallowed_host_is_rejected() {
        let redirect = b"HTTP/1.1 302 Found\r\nLocation: https://evil.example/file.zip\r\nContent-Length: 0\r\n\r\n".to_vec();
        let transport = ScriptedTransport {
            responses: Mutex::new(VecDeque::from(vec![redirect])),
            written: Arc::new(Mutex::new(Vec::new())),
        };
        let request = RequestBuilder::new(Method::Get, "/v1/games/42/mods/7/files/9/download").build();
        let allowed = vec!["cdn.mod.io".to_string()];
        let err = block_on(send_with_redirects(&transport, "g-42.modapi.io", 443, true, request, &allowed)).unwrap_err();
        assert_eq!(err.downcast_ref::<HttpError>(), Some(&HttpError::DownloadNotPermitted));
    }

    #[test]
    fn bad_gateway_maps_to_servers_overloaded() {
        let raw = b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 0\r\n\r\n".to_vec();
        let transport = ScriptedTransport {
            responses: Mutex::new(VecDeque::from(vec![raw])),
            written: Arc::new(Mutex::new(Vec::new())),
        };
        let request = RequestBuilder::new(Method::Get, "/v1/games/42/mods").build();
        let err = block_on(send_with_redirects(&transport, "g-42.modapi.io", 443, true, request, &[])).unwrap_err();
        assert_eq!(err.downcast_ref::<HttpError>(), Some(&HttpError::ServersOverloaded));
    }

    #[allow(dead_code)]
    fn unused_body_variant_reference(_b: Body) {}
}
