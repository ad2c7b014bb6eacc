//! Error plumbing shared by every crate in the workspace.
//!
//! Mirrors the teacher's `common::errors` module: a type-erased `Error`
//! built on the `failure` crate, plus a closed set of `Fail` enums for the
//! condition families named in the mod.io SDK's error taxonomy so call
//! sites can `downcast_ref` back to a structured code instead of matching
//! on message strings.

pub use failure::{err_msg, format_err, Error, Fail};

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Generic runtime conditions that aren't specific to one subsystem.
#[derive(Debug, Fail, Clone, Copy, PartialEq, Eq)]
pub enum GenericError {
    #[fail(display = "operation was cancelled")]
    OperationCanceled,
    #[fail(display = "operation queue is closed")]
    QueueClosed,
    #[fail(display = "end of file")]
    EndOfFile,
    #[fail(display = "could not create handle")]
    CouldNotCreateHandle,
}

/// Filesystem-layer conditions (`pkg/file`).
#[derive(Debug, Fail, Clone, Copy, PartialEq, Eq)]
pub enum FilesystemError {
    #[fail(display = "read error")]
    ReadError,
    #[fail(display = "unable to create folder")]
    UnableToCreateFolder,
    #[fail(display = "file is locked")]
    FileLocked,
    #[fail(display = "file not found")]
    FileNotFound,
    #[fail(display = "no permission")]
    NoPermission,
    #[fail(display = "directory not found")]
    DirectoryNotFound,
}

/// HTTP pipeline conditions (`pkg/http`).
#[derive(Debug, Fail, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[fail(display = "cannot open connection")]
    CannotOpenConnection,
    #[fail(display = "request error: {}", _0)]
    RequestError(String),
    #[fail(display = "invalid response")]
    InvalidResponse,
    #[fail(display = "resource not available")]
    ResourceNotAvailable,
    #[fail(display = "excessive redirects")]
    ExcessiveRedirects,
    #[fail(display = "download not permitted")]
    DownloadNotPermitted,
    #[fail(display = "servers overloaded")]
    ServersOverloaded,
    #[fail(display = "http transport not initialized")]
    HttpNotInitialized,
    #[fail(display = "insufficient permissions")]
    InsufficientPermissions,
}

/// Zip/Zip64 archive conditions (`pkg/compression`).
#[derive(Debug, Fail, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    #[fail(display = "invalid archive header: {}", _0)]
    InvalidHeader(String),
    #[fail(display = "unsupported compression method")]
    UnsupportedCompression,
}

/// Compression-stream conditions. `EndOfStream` is the normal terminator
/// for an inflate, not an error condition.
#[derive(Debug, Fail, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    #[fail(display = "end of stream")]
    EndOfStream,
    #[fail(display = "invalid deflate block header")]
    InvalidBlockHeader,
    #[fail(display = "invalid huffman code")]
    InvalidHuffmanCode,
    #[fail(display = "invalid back-reference distance")]
    InvalidBackReference,
}

/// Mod-management conditions (`pkg/modio-core`).
#[derive(Debug, Fail, Clone, Copy, PartialEq, Eq)]
pub enum ModManagementError {
    #[fail(display = "install or update was cancelled")]
    InstallOrUpdateCancelled,
    #[fail(display = "upload was cancelled")]
    UploadCancelled,
    #[fail(display = "mod management is disabled")]
    ModManagementDisabled,
}

/// API-level conditions surfaced from a non-2xx response body.
#[derive(Debug, Fail, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[fail(display = "rate limited")]
    RateLimited,
    #[fail(display = "api error {}: {}", code, message)]
    ServerError {
        code: u32,
        error_ref: u32,
        message: String,
    },
}

impl ApiError {
    pub fn code(&self) -> Option<u32> {
        match self {
            ApiError::ServerError { code, .. } => Some(*code),
            ApiError::RateLimited => None,
        }
    }

    pub fn error_ref(&self) -> Option<u32> {
        match self {
            ApiError::ServerError { error_ref, .. } => Some(*error_ref),
            ApiError::RateLimited => None,
        }
    }
}

#[derive(Debug, Fail, Clone, Copy, PartialEq, Eq)]
pub enum UserDataError {
    #[fail(display = "invalid or expired user session")]
    InvalidUser,
}

#[derive(Debug, Fail, Clone, Copy, PartialEq, Eq)]
pub enum MonetizationError {
    #[fail(display = "entitlement not yet settled, retry later")]
    RetryEntitlements,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downcast_roundtrip() {
        let err: Error = GenericError::OperationCanceled.into();
        assert_eq!(
            err.downcast_ref::<GenericError>(),
            Some(&GenericError::OperationCanceled)
        );
    }

    #[test]
    fn format_err_is_available() {
        let err = format_err!("boom {}", 42);
        assert_eq!(format!("{}", err), "boom 42");
    }
}
