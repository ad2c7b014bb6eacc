//! A cancelable wait for a duration. Used for the response-cache TTL,
//! the rate-limit backoff, and the ~1ms completion-poll interval the
//! file service uses while waiting on platform I/O (spec §4.2, §4.6).

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use base_error::{GenericError, Result};

#[derive(Clone)]
pub struct Timer {
    deadline: Instant,
    cancelled: Arc<AtomicBool>,
}

impl Timer {
    pub fn new(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancels the timer; any pending `wait()` resolves with
    /// `operation_canceled` on its next poll.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn wait(&self) -> TimerWait {
        TimerWait {
            deadline: self.deadline,
            cancelled: self.cancelled.clone(),
        }
    }
}

pub struct TimerWait {
    deadline: Instant,
    cancelled: Arc<AtomicBool>,
}

impl Future for TimerWait {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Poll::Ready(Err(GenericError::OperationCanceled.into()));
        }
        if Instant::now() >= self.deadline {
            Poll::Ready(Ok(()))
        } else {
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pump::Executor;
    use std::sync::atomic::AtomicBool as StdAtomicBool;

    #[test]
    fn timer_resolves_after_duration_elapses() {
        let executor = Executor::new();
        let timer = Timer::new(Duration::from_millis(5));
        let done = Arc::new(StdAtomicBool::new(false));
        let done2 = done.clone();

        executor.spawn(async move {
            timer.wait().await.unwrap();
            done2.store(true, Ordering::SeqCst);
        });

        let start = Instant::now();
        while !done.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(1) {
            executor.pump();
        }

        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn cancel_is_observed_on_next_poll() {
        let executor = Executor::new();
        let timer = Timer::new(Duration::from_secs(60));
        timer.cancel();

        let result = Arc::new(std::sync::Mutex::new(None));
        let result2 = result.clone();
        executor.spawn(async move {
            let r = timer.wait().await;
            *result2.lock().unwrap() = Some(r.is_err());
        });

        executor.pump_until_idle();
        assert_eq!(*result.lock().unwrap(), Some(true));
    }
}
