//! L0 async runtime: a single-threaded cooperative scheduler with no
//! background threads, pumped explicitly by the host (spec §4.1, §5).
//!
//! Grounded on the teacher's `executor` crate (`bundle.rs` for the task
//! set a pump drains, `channel/queue.rs` for the FIFO admission idea
//! behind `OperationQueue`, `cancellation.rs` for the cancellation-token
//! contract) minus the `no_std`/io_uring-specific reactor internals,
//! which don't apply to a portable SDK that must also run on whatever
//! blocking file/TLS primitives the host platform provides.

mod pump;
mod queue;
mod strand;
mod timer;

pub use pump::{Executor, TaskHandle};
pub use queue::{OperationQueue, Ticket};
pub use strand::Strand;
pub use timer::Timer;
