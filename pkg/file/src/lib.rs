//! L1 file service: byte-level async I/O plus the deterministic path
//! layout for mods, cached media, and user metadata (spec §4.2, §6).
//!
//! Grounded on the teacher's `file` crate (`local/file.rs`'s
//! `FileHandle`-wrapping `LocalFile`, `local/path.rs`, `temp.rs`), with
//! the raw-syscall/`no_std` `FileHandle` replaced by `std::fs::File`
//! driven through a `Strand` so concurrent operations against the same
//! `FileObject` still serialize exactly as spec §4.1 requires.

mod error;
mod object;
pub mod paths;
mod service;

pub use error::map_io_error;
pub use object::{FileObject, OpenMode};
pub use service::FileService;
