//! Connection establishment. The teacher's own HTTP client is built over
//! `async-std::net::TcpStream`, which presupposes a background reactor
//! thread; this workspace's executor (`pkg/executor`) is a single-threaded,
//! host-pumped scheduler with no such reactor. Rather than reintroduce one,
//! this transport follows the same pattern `pkg/file::object::FileObject`
//! uses for blocking syscalls: a plain blocking `std::net::TcpStream` (and
//! `native_tls::TlsStream` over it), with every blocking call preceded by a
//! `yield_now().await` suspension point so the call still composes with
//! cooperative scheduling even though it isn't truly async I/O.

use std::io::{Read, Write};
use std::net::TcpStream;

use async_trait::async_trait;
use base_error::{HttpError, Result};
use modio_common::io::{yield_now, Readable, Writeable};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, host: &str, port: u16, use_tls: bool) -> Result<Box<dyn Connection>>;
}

#[async_trait]
pub trait Connection: Readable + Writeable + Send {}

struct PlainConnection {
    stream: TcpStream,
}

#[async_trait]
impl Readable for PlainConnection {
    async fn read(&mut self, output: &mut [u8]) -> Result<usize> {
        yield_now().await;
        self.stream
            .read(output)
            .map_err(|e| HttpError::RequestError(e.to_string()).into())
    }
}

#[async_trait]
impl Writeable for PlainConnection {
    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        yield_now().await;
        self.stream
            .write(data)
            .map_err(|e| HttpError::RequestError(e.to_string()).into())
    }

    async fn flush(&mut self) -> Result<()> {
        yield_now().await;
        self.stream
            .flush()
            .map_err(|e| HttpError::RequestError(e.to_string()).into())
    }
}

impl Connection for PlainConnection {}

struct TlsConnection {
    stream: native_tls::TlsStream<TcpStream>,
}

#[async_trait]
impl Readable for TlsConnection {
    async fn read(&mut self, output: &mut [u8]) -> Result<usize> {
        yield_now().await;
        self.stream
            .read(output)
            .map_err(|e| HttpError::RequestError(e.to_string()).into())
    }
}

#[async_trait]
impl Writeable for TlsConnection {
    async fn write(&mut self, data: &[u8]) -> Result<usize> {
        yield_now().await;
        self.stream
            .write(data)
            .map_err(|e| HttpError::RequestError(e.to_string()).into())
    }

    async fn flush(&mut self) -> Result<()> {
        yield_now().await;
        self.stream
            .flush()
            .map_err(|e| HttpError::RequestError(e.to_string()).into())
    }
}

impl Connection for TlsConnection {}

#[derive(Default)]
pub struct TcpTlsTransport;

impl TcpTlsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TcpTlsTransport {
    async fn connect(&self, host: &str, port: u16, use_tls: bool) -> Result<Box<dyn Connection>> {
        yield_now().await;
        let stream = TcpStream::connect((host, port))
            .map_err(|_| HttpError::CannotOpenConnection)?;

        if !use_tls {
            return Ok(Box::new(PlainConnection { stream }));
        }

        let connector = native_tls::TlsConnector::new().map_err(|_| HttpError::CannotOpenConnection)?;
        let tls_stream = connector
            .connect(host, stream)
            .map_err(|_| HttpError::CannotOpenConnection)?;
        Ok(Box::new(TlsConnection { stream: tls_stream }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::Arc;
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

    /// `TcpTlsTransport` needs a live socket to exercise meaningfully;
    /// this only checks that an unreachable port surfaces the mapped
    /// error rather than panicking, which is the one behavior unit tests
    /// can observe without a network (the client's send-loop tests in
    /// `client.rs` cover the rest against an in-memory `Transport` double).
    #[test]
    fn connecting_to_a_closed_port_is_an_error() {
        let transport = TcpTlsTransport::new();
        let result = block_on(transport.connect("127.0.0.1", 1, false));
        assert!(result.is_err());
    }
}
