use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::atom::Atom;
use crate::error::Error;
use crate::ident::{Pid, Ref};
use crate::message::{CtrlKind, TransportMsg};
use crate::node::{NodeControl, Registry};
use crate::pattern::{Binding, match_term};
use crate::queue::MsgQueue;
use crate::term::Term;

/// What the control side effects decided about the message itself.
enum Disposition {
    Drop,
    Enqueue,
}

/// A local recipient: the self pid, an optional registered name, link and
/// monitor bookkeeping, and the queue consumers receive from.
///
/// One executor owns the consuming side; producers only touch the
/// thread-safe queue and the guarded link/monitor state.
pub struct Mailbox {
    pid: Pid,
    name: Mutex<Option<Atom>>,
    links: Mutex<HashSet<Pid>>,
    monitors: Mutex<HashMap<Ref, Pid>>,
    /// Seconds since the epoch at close time; 0 while live.
    freed_at: AtomicU64,
    queue: MsgQueue,
}

impl Mailbox {
    #[must_use]
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            name: Mutex::new(None),
            links: Mutex::new(HashSet::new()),
            monitors: Mutex::new(HashMap::new()),
            freed_at: AtomicU64::new(0),
            queue: MsgQueue::new(),
        }
    }

    #[must_use]
    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    #[must_use]
    pub fn name(&self) -> Option<Atom> {
        *self.name.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_name(&self, name: Option<Atom>) {
        *self.name.lock().unwrap_or_else(PoisonError::into_inner) = name;
    }

    #[must_use]
    pub fn queue(&self) -> &MsgQueue {
        &self.queue
    }

    /// Non-zero once the mailbox has been closed.
    #[must_use]
    pub fn freed_at(&self) -> u64 {
        self.freed_at.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.freed_at() != 0
    }

    /// Snapshot of the linked pids.
    #[must_use]
    pub fn links(&self) -> Vec<Pid> {
        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Snapshot of the monitor table.
    #[must_use]
    pub fn monitors(&self) -> Vec<(Ref, Pid)> {
        self.monitors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(r, p)| (r.clone(), p.clone()))
            .collect()
    }

    /// Takes an inbound transport message: applies the control side
    /// effects, then enqueues or drops it. A side effect that fails still
    /// enqueues the message, with its error slot filled, so nothing is
    /// lost.
    pub fn deliver(&self, mut msg: TransportMsg) {
        match self.apply_control(&msg) {
            Ok(Disposition::Drop) => {}
            Ok(Disposition::Enqueue) => self.queue.push(msg),
            Err(err) => {
                warn!(mailbox = %self.pid, error = %err, "dispatch failed, delivering with error");
                msg.set_error(err);
                self.queue.push(msg);
            }
        }
    }

    fn apply_control(&self, msg: &TransportMsg) -> Result<Disposition, Error> {
        let sender = || {
            msg.sender()
                .cloned()
                .ok_or_else(|| Error::bad_arg(format!("{:?} without a sender pid", msg.kind())))
        };
        let reference = || {
            msg.reference()
                .cloned()
                .ok_or_else(|| Error::bad_arg(format!("{:?} without a reference", msg.kind())))
        };
        match msg.kind() {
            CtrlKind::Link => {
                let from = sender()?;
                debug!(mailbox = %self.pid, from = %from, "link");
                self.links
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(from);
                Ok(Disposition::Drop)
            }
            CtrlKind::Unlink => {
                let from = sender()?;
                debug!(mailbox = %self.pid, from = %from, "unlink");
                self.links
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&from);
                Ok(Disposition::Drop)
            }
            CtrlKind::MonitorP => {
                let from = sender()?;
                self.monitors
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(reference()?, from);
                Ok(Disposition::Drop)
            }
            CtrlKind::DemonitorP => {
                self.monitors
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&reference()?);
                Ok(Disposition::Drop)
            }
            CtrlKind::MonitorPExit => {
                self.monitors
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&reference()?);
                Ok(Disposition::Enqueue)
            }
            kind if kind.is_exit() => {
                let from = sender()?;
                debug!(mailbox = %self.pid, from = %from, reason = %msg.reason(), "exit");
                self.links
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&from);
                Ok(Disposition::Enqueue)
            }
            _ => Ok(Disposition::Enqueue),
        }
    }

    /// Tears the mailbox down: stamps the freed time, cancels and empties
    /// the queue, optionally deregisters the name, then broadcasts the
    /// exit to every linked pid and monitor-exit to every monitor,
    /// best-effort per destination. Link, monitor, and name state is
    /// cleared.
    pub fn close(&self, node: &dyn NodeControl, registry: Option<&dyn Registry>, reason: &Term) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(1)
            .max(1);
        self.freed_at.store(now, Ordering::Release);
        self.queue.reset();

        let name = self
            .name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let (Some(registry), Some(name)) = (registry, name) {
            registry.unregister(name);
        }

        let links = std::mem::take(&mut *self.links.lock().unwrap_or_else(PoisonError::into_inner));
        for to in links {
            if let Err(err) = node.send_exit(&self.pid, &to, reason) {
                warn!(mailbox = %self.pid, to = %to, error = %err, "exit broadcast dropped");
            }
        }
        let monitors =
            std::mem::take(&mut *self.monitors.lock().unwrap_or_else(PoisonError::into_inner));
        for (reference, to) in monitors {
            if let Err(err) = node.send_monitor_exit(&self.pid, &to, &reference, reason) {
                warn!(mailbox = %self.pid, to = %to, error = %err, "monitor-exit broadcast dropped");
            }
        }
        debug!(mailbox = %self.pid, reason = %reason, "closed");
    }

    /// One receive with an optional deadline. A closed mailbox answers
    /// [`Error::Closed`] immediately.
    pub async fn recv(&self, timeout: Option<Duration>) -> Result<TransportMsg, Error> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.queue.recv(timeout).await
    }

    /// The n-shot receive protocol over this mailbox's queue. A handler
    /// that runs after the mailbox closed observes [`Error::Closed`] and
    /// the loop ends regardless of its answer.
    pub async fn recv_loop<F>(&self, mut handler: F, timeout: Option<Duration>, repeat: i64)
    where
        F: FnMut(Result<TransportMsg, Error>) -> bool,
    {
        if self.is_closed() {
            let _ = handler(Err(Error::Closed));
            return;
        }
        self.queue
            .recv_loop(
                |res| {
                    if self.is_closed() {
                        let _ = handler(Err(Error::Closed));
                        return false;
                    }
                    handler(res)
                },
                timeout,
                repeat,
            )
            .await;
    }

    /// Like [`recv_loop`](Self::recv_loop), delivering only messages whose
    /// payload matches `pattern`, together with the variable bindings the
    /// match produced. Non-matching messages are consumed and count as
    /// deliveries.
    pub async fn recv_match<F>(
        &self,
        pattern: &Term,
        mut handler: F,
        timeout: Option<Duration>,
        repeat: i64,
    ) where
        F: FnMut(Result<(TransportMsg, Binding), Error>) -> bool,
    {
        self.recv_loop(
            |res| match res {
                Ok(msg) => {
                    let mut binding = Binding::new();
                    if match_term(pattern, msg.payload(), &mut binding) {
                        handler(Ok((msg, binding)))
                    } else {
                        true
                    }
                }
                Err(err) => handler(Err(err)),
            },
            timeout,
            repeat,
        )
        .await;
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("pid", &self.pid)
            .field("name", &self.name())
            .field("closed", &self.is_closed())
            .field("queued", &self.queue.len())
            .finish()
    }
}
