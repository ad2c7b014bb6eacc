//! L3 HTTP pipeline: request/response types, the wire send loop with
//! redirect handling, a blocking-but-yield-wrapped transport, and the
//! download/upload operations built on top of it (spec §4.2, §4.5, §9).
//!
//! Grounded on the teacher's `http` crate, with its `async-std`-backed
//! transport replaced by a plain blocking `TcpStream`/`TlsStream` driven
//! through the same yield-around-syscall pattern `pkg/file` uses, since
//! this workspace's executor has no background reactor to hand an
//! `AsyncRead`/`AsyncWrite` adapter to.

pub mod client;
pub mod download;
pub mod headers;
pub mod request;
pub mod response;
pub mod status;
pub mod transport;
pub mod upload;
pub mod uri;

pub use client::{send_once, send_with_redirects, MAX_REDIRECTS};
pub use headers::Headers;
pub use request::{Body, Method, MultipartPart, Request, RequestBuilder};
pub use response::{ApiErrorBody, Response};
pub use status::StatusCode;
pub use transport::{Connection, TcpTlsTransport, Transport};
pub use uri::{server_host, substitute_placeholders, Environment};
