//! Byte-stream traits. Grounded on the teacher's `common::io` module:
//! `Readable`/`Writeable` are `async_trait` object-safe traits so a
//! `FileObject`, a TLS connection, and a `DynamicBuffer` cursor can all be
//! driven through the same pipeline code (the zip engine and the HTTP
//! pipeline are generic over `dyn Readable`/`dyn Writeable`).

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use base_error::Result;

#[async_trait]
pub trait Readable: Send {
    /// Reads at least one byte into `output`, unless already at end of
    /// file. Returns the number of bytes read.
    async fn read(&mut self, output: &mut [u8]) -> Result<usize>;

    async fn read_exact(&mut self, mut output: &mut [u8]) -> Result<()> {
        while !output.is_empty() {
            let n = self.read(output).await?;
            if n == 0 {
                return Err(base_error::GenericError::EndOfFile.into());
            }
            output = &mut output[n..];
        }
        Ok(())
    }
}

#[async_trait]
pub trait Writeable: Send {
    async fn write(&mut self, data: &[u8]) -> Result<usize>;

    async fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            let n = self.write(data).await?;
            data = &data[n..];
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Yields control back to the pump exactly once. Suspension points in the
/// executor and in cooperative polling loops (spec §4.1, §4.2) are all
/// built on this primitive.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
