//! The executor itself: a bundle of tasks polled by explicit `pump()`
//! calls. There is exactly one of these per process; the host owns it
//! and decides when to call in.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Wake, Waker};

struct Task {
    future: Mutex<Pin<Box<dyn Future<Output = ()> + Send>>>,
    woken: AtomicBool,
    finished: AtomicBool,
}

impl Wake for Task {
    fn wake(self: Arc<Self>) {
        self.woken.store(true, Ordering::SeqCst);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.woken.store(true, Ordering::SeqCst);
    }
}

/// A handle to a spawned task. Dropping it does not cancel the task;
/// operations observe cancellation through their own cancellation token
/// (spec §5), not through task-handle lifetime.
pub struct TaskHandle {
    task: Arc<Task>,
}

impl TaskHandle {
    pub fn is_finished(&self) -> bool {
        self.task.finished.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct Executor {
    tasks: Mutex<Vec<Arc<Task>>>,
}

impl Executor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Posts a future onto the executor. It runs to completion across
    /// however many `pump()` calls it takes to resolve every suspension
    /// point inside it.
    pub fn spawn(&self, future: impl Future<Output = ()> + Send + 'static) -> TaskHandle {
        let task = Arc::new(Task {
            future: Mutex::new(Box::pin(future)),
            woken: AtomicBool::new(true),
            finished: AtomicBool::new(false),
        });
        self.tasks.lock().unwrap().push(task.clone());
        TaskHandle { task }
    }

    /// Polls every task that has been woken since the last pump, exactly
    /// once each. Returns whether any task made progress, so the host can
    /// decide whether to pump again immediately or wait for the next
    /// tick/timer/input event.
    pub fn pump(&self) -> bool {
        let snapshot: Vec<Arc<Task>> = self.tasks.lock().unwrap().clone();
        let mut did_work = false;

        for task in &snapshot {
            if !task.woken.swap(false, Ordering::SeqCst) {
                continue;
            }
            did_work = true;

            let waker = Waker::from(task.clone());
            let mut cx = Context::from_waker(&waker);
            let mut fut = task.future.lock().unwrap();
            if fut.as_mut().poll(&mut cx).is_ready() {
                task.finished.store(true, Ordering::SeqCst);
            }
        }

        self.tasks.lock().unwrap().retain(|t| !t.finished.load(Ordering::SeqCst));

        did_work
    }

    pub fn pending_task_count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Pumps until no task makes further progress in one pass. Useful in
    /// tests and for a host that wants to drain all currently-runnable
    /// work before yielding back to its own event loop.
    pub fn pump_until_idle(&self) {
        while self.pump() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn spawned_task_runs_to_completion() {
        let executor = Executor::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter2 = counter.clone();

        let handle = executor.spawn(async move {
            modio_common::io::yield_now().await;
            counter2.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!handle.is_finished());
        executor.pump_until_idle();
        assert!(handle.is_finished());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pump_returns_false_when_nothing_runnable() {
        let executor = Executor::new();
        assert!(!executor.pump());
    }
}
