use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base_error::{FilesystemError, GenericError, Result};
use modio_common::cancellation::{CancellationFlag, CancellationToken};
use modio_common::dynamic_buffer::DynamicBuffer;
use modio_executor::Strand;

use crate::error::map_io_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy)]
pub enum SeekDirection {
    Absolute,
    Forward,
    Backward,
}

/// An open file, asynchronous by contract: every operation is a
/// suspension point (spec §4.2, §5) even though this portable
/// implementation performs the underlying syscall synchronously inside
/// that suspension rather than polling a platform completion queue —
/// the cooperative-scheduling guarantee callers depend on (FIFO
/// ordering per strand, sticky cancellation observed at the next
/// suspension) holds either way.
pub struct FileObject {
    path: PathBuf,
    mode: OpenMode,
    file: Mutex<std::fs::File>,
    strand: Strand,
    cancel: CancellationFlag,
}

const CHUNK: usize = 64 * 1024;

impl FileObject {
    pub async fn open<P: AsRef<Path>>(path: P, mode: OpenMode, overwrite: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|_| FilesystemError::UnableToCreateFolder)?;
        }

        let mut options = OpenOptions::new();
        options.read(true);
        match mode {
            OpenMode::ReadOnly => {}
            OpenMode::ReadWrite => {
                options.write(true).create(true);
                if overwrite {
                    options.truncate(true);
                }
            }
        }

        let file = options.open(&path).map_err(map_io_error)?;

        Ok(Self {
            path,
            mode,
            file: Mutex::new(file),
            strand: Strand::new(),
            cancel: CancellationFlag::new(),
        })
    }

    pub async fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(path, OpenMode::ReadWrite, true).await
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(GenericError::OperationCanceled.into());
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn seek(&self, offset: i64, direction: SeekDirection) -> Result<u64> {
        self.check_cancelled()?;
        self.strand
            .run(|| async {
                let seek_from = match direction {
                    SeekDirection::Absolute => SeekFrom::Start(offset as u64),
                    SeekDirection::Forward => SeekFrom::Current(offset),
                    SeekDirection::Backward => SeekFrom::Current(-offset),
                };
                modio_common::io::yield_now().await;
                let mut file = self.file.lock().unwrap();
                file.seek(seek_from).map_err(map_io_error)
            })
            .await
    }

    pub async fn size(&self) -> Result<u64> {
        self.check_cancelled()?;
        self.strand
            .run(|| async {
                modio_common::io::yield_now().await;
                let file = self.file.lock().unwrap();
                Ok(file.metadata().map_err(map_io_error)?.len())
            })
            .await
    }

    /// Reads up to `max_bytes` at `offset` without disturbing the file's
    /// seek position. A partial read (including zero bytes at
    /// end-of-file) is normal, not an error.
    pub async fn read_some_at(&self, offset: u64, max_bytes: usize) -> Result<DynamicBuffer> {
        self.check_cancelled()?;
        self.strand
            .run(|| async {
                modio_common::io::yield_now().await;
                let mut file = self.file.lock().unwrap();
                file.seek(SeekFrom::Start(offset)).map_err(map_io_error)?;

                let mut buf = DynamicBuffer::new();
                let mut remaining = max_bytes;
                let mut scratch = vec![0u8; CHUNK.min(max_bytes.max(1))];

                while remaining > 0 {
                    let want = remaining.min(scratch.len());
                    let n = file.read(&mut scratch[..want]).map_err(map_io_error)?;
                    if n == 0 {
                        break;
                    }
                    buf.append(&scratch[..n]);
                    remaining -= n;
                }

                Ok(buf)
            })
            .await
    }

    /// Reads up to `max_bytes`, advancing the seek pointer, appending
    /// into `into`. Returns the number of bytes read.
    pub async fn read_some(&self, max_bytes: usize, into: &mut DynamicBuffer) -> Result<usize> {
        self.check_cancelled()?;
        let chunk = self
            .strand
            .run(|| async {
                modio_common::io::yield_now().await;
                let mut file = self.file.lock().unwrap();
                let mut scratch = vec![0u8; max_bytes];
                let n = file.read(&mut scratch).map_err(map_io_error)?;
                scratch.truncate(n);
                Ok::<Vec<u8>, base_error::Error>(scratch)
            })
            .await?;

        let n = chunk.len();
        into.append(&chunk);
        Ok(n)
    }

    pub async fn write_some_at(&self, offset: u64, data: &[u8]) -> Result<usize> {
        if self.mode == OpenMode::ReadOnly {
            return Err(FilesystemError::NoPermission.into());
        }
        self.check_cancelled()?;
        self.strand
            .run(|| async {
                modio_common::io::yield_now().await;
                let mut file = self.file.lock().unwrap();
                file.seek(SeekFrom::Start(offset)).map_err(map_io_error)?;
                file.write(data).map_err(map_io_error)
            })
            .await
    }

    pub async fn write_some(&self, data: &[u8]) -> Result<usize> {
        if self.mode == OpenMode::ReadOnly {
            return Err(FilesystemError::NoPermission.into());
        }
        self.check_cancelled()?;
        self.strand
            .run(|| async {
                modio_common::io::yield_now().await;
                let mut file = self.file.lock().unwrap();
                file.write(data).map_err(map_io_error)
            })
            .await
    }

    pub async fn truncate(&self, new_size: u64) -> Result<()> {
        if self.mode == OpenMode::ReadOnly {
            return Err(FilesystemError::NoPermission.into());
        }
        self.check_cancelled()?;
        self.strand
            .run(|| async {
                modio_common::io::yield_now().await;
                let file = self.file.lock().unwrap();
                file.set_len(new_size).map_err(map_io_error)
            })
            .await
    }

    /// Closes, renames, and reopens in place so later operations on this
    /// handle still work.
    pub async fn rename(&mut self, new_path: impl AsRef<Path>) -> Result<()> {
        self.check_cancelled()?;
        let new_path = new_path.as_ref().to_path_buf();

        self.strand
            .run(|| async {
                modio_common::io::yield_now().await;
                std::fs::rename(&self.path, &new_path).map_err(map_io_error)
            })
            .await?;

        let mut options = OpenOptions::new();
        options.read(true);
        if self.mode == OpenMode::ReadWrite {
            options.write(true);
        }
        let file = options.open(&new_path).map_err(map_io_error)?;
        *self.file.lock().unwrap() = file;
        self.path = new_path;
        Ok(())
    }

    /// Sets a sticky cancellation flag observed at the next suspension
    /// point by any in-flight operation on this file.
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }
}
