use base_error::{Error, FilesystemError};

/// Collapses a platform I/O error onto the neutral `FilesystemError`
/// family named in spec §4.2's fault model. The teacher's platform
/// backends (`platform/linux/...FileObjectImplementation.h`,
/// `platform/macos/...`) each do their own translation of native codes;
/// here `std::io::ErrorKind` already normalizes that for us.
pub fn map_io_error(err: std::io::Error) -> Error {
    use std::io::ErrorKind;

    match err.kind() {
        ErrorKind::NotFound => FilesystemError::FileNotFound.into(),
        ErrorKind::PermissionDenied => FilesystemError::NoPermission.into(),
        ErrorKind::AlreadyExists => FilesystemError::FileLocked.into(),
        _ => FilesystemError::ReadError.into(),
    }
}
