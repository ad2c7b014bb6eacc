//! FIFO admission queue. Used to cap concurrency on scarce resources —
//! currently the API-request queue and the file-download queue, each
//! bound to 1 concurrent ticket (spec §4.1).

use std::collections::{HashMap, VecDeque};
use std::future::poll_fn;
use std::sync::{Arc, Mutex};
use std::task::{Poll, Waker};

struct QueueState {
    order: VecDeque<u64>,
    wakers: HashMap<u64, Waker>,
    next_id: u64,
}

pub struct OperationQueue {
    state: Mutex<QueueState>,
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                order: VecDeque::new(),
                wakers: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Takes an admission ticket. The ticket is appended to the back of
    /// the queue; `wait_for_turn` suspends until it reaches the front.
    pub fn take_ticket(self: &Arc<Self>) -> Ticket {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.order.push_back(id);
        Ticket {
            queue: self.clone(),
            id,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Ticket {
    queue: Arc<OperationQueue>,
    id: u64,
}

impl Ticket {
    /// Suspends until this ticket reaches the head of the queue.
    pub async fn wait_for_turn(&self) {
        poll_fn(|cx| {
            let mut state = self.queue.state.lock().unwrap();
            if state.order.front() == Some(&self.id) {
                Poll::Ready(())
            } else {
                state.wakers.insert(self.id, cx.waker().clone());
                Poll::Pending
            }
        })
        .await
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let mut state = self.queue.state.lock().unwrap();
        if let Some(pos) = state.order.iter().position(|&id| id == self.id) {
            state.order.remove(pos);
        }
        state.wakers.remove(&self.id);

        if let Some(&front) = state.order.front() {
            if let Some(waker) = state.wakers.get(&front) {
                waker.wake_by_ref();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pump::Executor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn tickets_run_in_fifo_order() {
        let executor = Executor::new();
        let queue = Arc::new(OperationQueue::new());
        let completion_order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3u32 {
            let queue = queue.clone();
            let completion_order = completion_order.clone();
            executor.spawn(async move {
                let ticket = queue.take_ticket();
                ticket.wait_for_turn().await;
                completion_order.lock().unwrap().push(i);
                // ticket dropped here, releasing the next one
            });
        }

        executor.pump_until_idle();
        assert_eq!(*completion_order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn dropping_a_waiting_ticket_dequeues_it() {
        let executor = Executor::new();
        let queue = Arc::new(OperationQueue::new());
        let ran = Arc::new(AtomicUsize::new(0));

        // Take and immediately drop a ticket before it ever gets a turn.
        let abandoned = queue.take_ticket();
        drop(abandoned);

        let queue2 = queue.clone();
        let ran2 = ran.clone();
        executor.spawn(async move {
            let ticket = queue2.take_ticket();
            ticket.wait_for_turn().await;
            ran2.fetch_add(1, Ordering::SeqCst);
        });

        executor.pump_until_idle();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty());
    }
}
