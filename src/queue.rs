use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};

use crate::error::Error;
use crate::message::TransportMsg;

/// A single-consumer, multi-producer FIFO of transport messages with an
/// asynchronous dequeue side.
///
/// Producers [`push`](Self::push) without blocking. The one consumer
/// [`recv`](Self::recv)s with an optional deadline; [`reset`](Self::reset)
/// cancels a pending receive (the waiter observes [`Error::Closed`]) and
/// drops everything queued. Delivery is in push order.
#[derive(Debug, Default)]
pub struct MsgQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

#[derive(Debug, Default)]
struct Inner {
    ready: VecDeque<TransportMsg>,
    epoch: u64,
}

impl MsgQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Producer side; never blocks.
    pub fn push(&self, msg: TransportMsg) {
        self.lock().ready.push_back(msg);
        self.notify.notify_one();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().ready.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().ready.is_empty()
    }

    /// Drops queued messages and cancels any pending receive.
    pub fn reset(&self) {
        {
            let mut q = self.lock();
            q.ready.clear();
            q.epoch += 1;
        }
        self.notify.notify_waiters();
    }

    /// Waits for the next message. `None` means wait forever. Ends with
    /// [`Error::Timeout`] when the deadline passes first and
    /// [`Error::Closed`] when a reset lands while waiting.
    pub async fn recv(&self, timeout: Option<Duration>) -> Result<TransportMsg, Error> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let epoch = self.lock().epoch;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            {
                let mut q = self.lock();
                if q.epoch != epoch {
                    return Err(Error::Closed);
                }
                if let Some(msg) = q.ready.pop_front() {
                    return Ok(msg);
                }
            }
            match deadline {
                Some(d) => {
                    if time::timeout_at(d, notified).await.is_err() {
                        return Err(Error::Timeout);
                    }
                }
                None => notified.await,
            }
        }
    }

    /// The n-shot receive protocol. The handler sees each delivery (or the
    /// timeout/cancellation error) and returns `true` to re-arm, up to
    /// `repeat` deliveries in total; `-1` means unlimited. A cancellation
    /// always ends the loop, whatever the handler returns.
    pub async fn recv_loop<F>(&self, mut handler: F, timeout: Option<Duration>, repeat: i64)
    where
        F: FnMut(Result<TransportMsg, Error>) -> bool,
    {
        let mut left = if repeat == 0 { 1 } else { repeat };
        loop {
            let res = self.recv(timeout).await;
            let cancelled = matches!(res, Err(Error::Closed));
            let rearm = handler(res);
            if cancelled || !rearm {
                return;
            }
            if left > 0 {
                left -= 1;
                if left == 0 {
                    return;
                }
            }
        }
    }
}
