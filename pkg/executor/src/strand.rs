//! A strand is a serializing executor: operations posted to the same
//! strand never overlap, even though they may suspend arbitrarily many
//! times in between (spec §4.1). Built directly on top of
//! `OperationQueue` — a strand is exactly a queue with a single logical
//! ticket holder at a time, which is the same guarantee a FIFO admission
//! queue already provides.

use std::future::Future;
use std::sync::Arc;

use crate::queue::OperationQueue;

pub struct Strand {
    queue: Arc<OperationQueue>,
}

impl Default for Strand {
    fn default() -> Self {
        Self::new()
    }
}

impl Strand {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(OperationQueue::new()),
        }
    }

    /// Runs `f` exclusively with respect to every other call to `run` on
    /// this strand: no other strand-bound future starts its body (or
    /// resumes after a suspension) while this one is in progress.
    pub async fn run<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self.queue.take_ticket();
        ticket.wait_for_turn().await;
        let result = f().await;
        drop(ticket);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pump::Executor;
    use std::sync::Mutex;

    #[test]
    fn strand_serializes_interleaved_operations() {
        let executor = Executor::new();
        let strand = Arc::new(Strand::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..2u32 {
            let strand = strand.clone();
            let log = log.clone();
            executor.spawn(async move {
                strand
                    .run(|| async {
                        log.lock().unwrap().push((i, "enter"));
                        modio_common::io::yield_now().await;
                        log.lock().unwrap().push((i, "exit"));
                    })
                    .await;
            });
        }

        executor.pump_until_idle();

        let log = log.lock().unwrap();
        // Task 0 must fully enter-then-exit before task 1 enters.
        assert_eq!(
            *log,
            vec![(0, "enter"), (0, "exit"), (1, "enter"), (1, "exit")]
        );
    }
}
