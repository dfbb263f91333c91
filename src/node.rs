use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::atom::Atom;
use crate::error::Error;
use crate::ident::{Pid, Ref};
use crate::mailbox::Mailbox;
use crate::term::Term;

/// The surface a node implementation offers the mailbox layer: outbound
/// exit signalling and mailbox teardown. The connection machinery behind
/// it lives outside this crate.
pub trait NodeControl {
    fn send_exit(&self, from: &Pid, to: &Pid, reason: &Term) -> Result<(), Error>;

    fn send_monitor_exit(
        &self,
        from: &Pid,
        to: &Pid,
        reference: &Ref,
        reason: &Term,
    ) -> Result<(), Error>;

    fn close_mailbox(&self, mbox: &Mailbox, reason: &Term);
}

/// Name-to-mailbox resolution for registered processes.
pub trait Registry {
    /// Claims `name` for `mbox`. Fails when the name is taken.
    fn register(&self, name: Atom, mbox: Arc<Mailbox>) -> Result<(), Error>;

    /// Releases `name`; answers whether it was held.
    fn unregister(&self, name: Atom) -> bool;

    fn lookup(&self, name: Atom) -> Option<Arc<Mailbox>>;
}

/// The in-process registry: one name, one mailbox.
#[derive(Default)]
pub struct LocalRegistry {
    entries: RwLock<HashMap<Atom, Arc<Mailbox>>>,
}

impl LocalRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registry for LocalRegistry {
    fn register(&self, name: Atom, mbox: Arc<Mailbox>) -> Result<(), Error> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&name) {
            return Err(Error::bad_arg(format!("name '{name}' is already registered")));
        }
        mbox.set_name(Some(name));
        entries.insert(name, mbox);
        Ok(())
    }

    fn unregister(&self, name: Atom) -> bool {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name);
        if let Some(mbox) = &removed {
            if mbox.name() == Some(name) {
                mbox.set_name(None);
            }
        }
        removed.is_some()
    }

    fn lookup(&self, name: Atom) -> Option<Arc<Mailbox>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .cloned()
    }
}
