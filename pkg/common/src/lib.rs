//! L0 primitives shared across the workspace: a scatter-gather dynamic
//! buffer, the `Readable`/`Writeable` byte-stream traits, and cancellation
//! tokens. Grounded on the teacher's `common` crate (`io.rs`,
//! `cancellation.rs`, `segmented_buffer.rs`), trimmed of the `no_std`
//! embedded-target plumbing that doesn't apply to a portable SDK.

pub mod cancellation;
pub mod dynamic_buffer;
pub mod io;

pub use cancellation::CancellationToken;
pub use dynamic_buffer::DynamicBuffer;
pub use io::{Readable, Writeable};
