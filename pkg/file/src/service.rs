//! Folder- and file-level operations that sit above a single
//! `FileObject`: creation, existence checks, recursive deletion, and the
//! free-space query the installer consults before starting a download
//! (spec §4.2).

use std::path::Path;

use base_error::{FilesystemError, Result};

use crate::error::map_io_error;

#[derive(Debug, Clone, Copy, Default)]
pub struct FileService;

impl FileService {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_folder(&self, path: &Path) -> Result<()> {
        modio_common::io::yield_now().await;
        std::fs::create_dir_all(path).map_err(|_| FilesystemError::UnableToCreateFolder.into())
    }

    pub async fn delete_folder_recursive(&self, path: &Path) -> Result<()> {
        modio_common::io::yield_now().await;
        match std::fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(map_io_error(err)),
        }
    }

    pub async fn file_exists(&self, path: &Path) -> bool {
        modio_common::io::yield_now().await;
        path.is_file()
    }

    pub async fn folder_exists(&self, path: &Path) -> bool {
        modio_common::io::yield_now().await;
        path.is_dir()
    }

    pub async fn delete_file(&self, path: &Path) -> Result<()> {
        modio_common::io::yield_now().await;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(map_io_error(err)),
        }
    }

    /// Size in bytes of everything under `path`, used to populate
    /// `size_on_disk` once a mod finishes extracting (spec §3 invariant:
    /// only exposed while installed).
    pub async fn folder_size(&self, path: &Path) -> Result<u64> {
        modio_common::io::yield_now().await;
        fn walk(path: &Path) -> std::io::Result<u64> {
            let mut total = 0u64;
            if path.is_dir() {
                for entry in std::fs::read_dir(path)? {
                    let entry = entry?;
                    total += walk(&entry.path())?;
                }
            } else {
                total += path.metadata()?.len();
            }
            Ok(total)
        }
        walk(path).map_err(map_io_error)
    }

    /// Bytes free on the filesystem backing `path`. The teacher's
    /// platform backends shell out to OS-specific statvfs/
    /// GetDiskFreeSpaceEx calls; this portable implementation has no
    /// stdlib equivalent, so it reports `None` rather than guessing,
    /// leaving callers to treat "unknown" as "don't block on it".
    pub async fn free_space_bytes(&self, _path: &Path) -> Option<u64> {
        modio_common::io::yield_now().await;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: std::future::Future>(fut: F) -> F::Output {
        use std::task::{Context, Poll, Wake, Waker};
        struct NoopWake;
        impl Wake for NoopWake {
            fn wake(self: std::sync::Arc<Self>) {}
        }
        let waker = Waker::from(std::sync::Arc::new(NoopWake));
        let mut cx = Context::from_waker(&waker);
        let mut fut = Box::pin(fut);
        loop {
            if let Poll::Ready(v) = fut.as_mut().poll(&mut cx) {
                return v;
            }
        }
    }

    #[test]
    fn create_then_delete_folder() {
        let dir = tempfile::tempdir().unwrap();
        let service = FileService::new();
        let nested = dir.path().join("a/b/c");

        block_on(async {
            service.create_folder(&nested).await.unwrap();
            assert!(service.folder_exists(&nested).await);

            service.delete_folder_recursive(&dir.path().join("a")).await.unwrap();
            assert!(!service.folder_exists(&nested).await);
        });
    }

    #[test]
    fn folder_size_sums_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let service = FileService::new();

        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.bin"), vec![0u8; 10]).unwrap();
        std::fs::write(dir.path().join("sub/b.bin"), vec![0u8; 20]).unwrap();

        block_on(async {
            let size = service.folder_size(dir.path()).await.unwrap();
            assert_eq!(size, 30);
        });
    }

    #[test]
    fn deleting_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = FileService::new();
        block_on(async {
            service.delete_file(&dir.path().join("missing")).await.unwrap();
        });
    }
}
