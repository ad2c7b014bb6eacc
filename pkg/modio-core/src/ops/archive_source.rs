//! Bridges a `FileObject` to the zip engine's `ArchiveSource` seam, so
//! `modio-compression` never needs to depend on the file crate directly.

use async_trait::async_trait;
use base_error::Result;
use modio_compression::{ArchiveSource, InflateSink};
use modio_file::FileObject;

pub struct FileArchiveSource<'a> {
    file: &'a FileObject,
}

impl<'a> FileArchiveSource<'a> {
    pub fn new(file: &'a FileObject) -> Self {
        Self { file }
    }
}

#[async_trait]
impl<'a> ArchiveSource for FileArchiveSource<'a> {
    async fn size(&self) -> Result<u64> {
        self.file.size().await
    }

    async fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        Ok(self.file.read_some_at(offset, len).await?.to_vec())
    }
}

/// Bridges `extract_entry_to`'s chunked decompression output to a
/// `FileObject`, writing each chunk at the next sequential offset so the
/// extracted file is built up incrementally instead of in one shot.
pub struct FileInflateSink<'a> {
    file: &'a FileObject,
    offset: u64,
}

impl<'a> FileInflateSink<'a> {
    pub fn new(file: &'a FileObject) -> Self {
        Self { file, offset: 0 }
    }
}

#[async_trait]
impl<'a> InflateSink for FileInflateSink<'a> {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_some_at(self.offset, chunk).await?;
        self.offset += chunk.len() as u64;
        Ok(())
    }
}
