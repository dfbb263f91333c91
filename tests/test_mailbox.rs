use std::sync::{Arc, Mutex};
use std::time::Duration;

use erlterm::{
    Atom, Binding, CtrlKind, Error, LocalRegistry, Mailbox, NodeControl, Pid, Ref, Registry,
    Term, TransportMsg,
};

fn pid(id: u32) -> Pid {
    Pid::new("test@host", id, 0, 1).unwrap()
}

fn reference(id: u32) -> Ref {
    Ref::new("test@host", &[id, 0, 1], 1).unwrap()
}

fn payload(n: i64) -> Term {
    Term::tuple(vec![Term::atom("msg").unwrap(), Term::Long(n)])
}

/// Records broadcasts; destinations listed in `refuse` answer with an
/// error so close's best-effort path gets exercised.
#[derive(Default)]
struct RecordingNode {
    exits: Mutex<Vec<(Pid, Pid, Term)>>,
    monitor_exits: Mutex<Vec<(Pid, Pid, Ref, Term)>>,
    refuse: Mutex<Vec<Pid>>,
}

impl NodeControl for RecordingNode {
    fn send_exit(&self, from: &Pid, to: &Pid, reason: &Term) -> Result<(), Error> {
        if self.refuse.lock().unwrap().contains(to) {
            return Err(Error::Closed);
        }
        self.exits
            .lock()
            .unwrap()
            .push((from.clone(), to.clone(), reason.clone()));
        Ok(())
    }

    fn send_monitor_exit(
        &self,
        from: &Pid,
        to: &Pid,
        reference: &Ref,
        reason: &Term,
    ) -> Result<(), Error> {
        if self.refuse.lock().unwrap().contains(to) {
            return Err(Error::Closed);
        }
        self.monitor_exits.lock().unwrap().push((
            from.clone(),
            to.clone(),
            reference.clone(),
            reason.clone(),
        ));
        Ok(())
    }

    fn close_mailbox(&self, mbox: &Mailbox, reason: &Term) {
        mbox.close(self, None, reason);
    }
}

#[tokio::test]
async fn messages_arrive_in_enqueue_order() {
    let mbox = Mailbox::new(pid(1));
    for n in 0..3 {
        mbox.deliver(TransportMsg::send(pid(1), payload(n)));
    }
    for n in 0..3 {
        let msg = mbox.recv(None).await.unwrap();
        assert_eq!(msg.payload(), &payload(n));
    }
    assert!(mbox.queue().is_empty());
}

#[tokio::test]
async fn link_and_unlink_mutate_state_without_enqueueing() {
    let mbox = Mailbox::new(pid(1));
    mbox.deliver(TransportMsg::link(pid(2), pid(1)));
    mbox.deliver(TransportMsg::link(pid(3), pid(1)));
    assert_eq!(mbox.links().len(), 2);
    assert!(mbox.queue().is_empty());

    mbox.deliver(TransportMsg::unlink(pid(2), pid(1)));
    assert_eq!(mbox.links(), vec![pid(3)]);
    assert!(mbox.queue().is_empty());
}

#[tokio::test]
async fn monitor_and_demonitor() {
    let mbox = Mailbox::new(pid(1));
    mbox.deliver(TransportMsg::monitor(pid(2), pid(1), reference(10)));
    assert_eq!(mbox.monitors(), vec![(reference(10), pid(2))]);
    assert!(mbox.queue().is_empty());

    mbox.deliver(TransportMsg::demonitor(pid(2), pid(1), reference(10)));
    assert!(mbox.monitors().is_empty());
}

#[tokio::test]
async fn exit_removes_link_and_reaches_the_consumer() {
    let mbox = Mailbox::new(pid(1));
    mbox.deliver(TransportMsg::link(pid(2), pid(1)));
    let reason = Term::atom("shutdown").unwrap();
    mbox.deliver(TransportMsg::exit(pid(2), pid(1), reason.clone()));

    assert!(mbox.links().is_empty());
    let msg = mbox.recv(None).await.unwrap();
    assert_eq!(msg.kind(), CtrlKind::Exit);
    assert_eq!(msg.reason(), &reason);
}

#[tokio::test]
async fn monitor_exit_clears_the_monitor_and_is_delivered() {
    let mbox = Mailbox::new(pid(1));
    mbox.deliver(TransportMsg::monitor(pid(2), pid(1), reference(10)));
    let reason = Term::atom("noproc").unwrap();
    mbox.deliver(TransportMsg::monitor_exit(
        pid(2),
        pid(1),
        reference(10),
        reason.clone(),
    ));

    assert!(mbox.monitors().is_empty());
    let msg = mbox.recv(None).await.unwrap();
    assert_eq!(msg.kind(), CtrlKind::MonitorPExit);
    assert_eq!(msg.reference(), Some(&reference(10)));
    assert_eq!(msg.reason(), &reason);
}

#[tokio::test]
async fn failed_dispatch_still_delivers_with_the_error_set() {
    let mbox = Mailbox::new(pid(1));
    // A link with no sender pid cannot update the link set.
    mbox.deliver(TransportMsg::new(CtrlKind::Link));
    let msg = mbox.recv(None).await.unwrap();
    assert_eq!(msg.kind(), CtrlKind::Link);
    assert!(msg.error().is_some());
    assert!(mbox.links().is_empty());
}

#[tokio::test]
async fn close_broadcasts_exactly_once_per_destination() {
    let node = RecordingNode::default();
    let registry = LocalRegistry::new();
    let name = Atom::new("svc_close_test").unwrap();
    let mbox = Arc::new(Mailbox::new(pid(1)));
    registry.register(name, Arc::clone(&mbox)).unwrap();

    mbox.deliver(TransportMsg::link(pid(2), pid(1)));
    mbox.deliver(TransportMsg::link(pid(3), pid(1)));
    mbox.deliver(TransportMsg::monitor(pid(4), pid(1), reference(10)));

    let reason = Term::atom("shutdown").unwrap();
    mbox.close(&node, Some(&registry), &reason);

    assert!(mbox.is_closed());
    assert!(mbox.freed_at() > 0);
    assert_eq!(mbox.name(), None);
    assert!(registry.lookup(name).is_none());
    assert!(mbox.links().is_empty());
    assert!(mbox.monitors().is_empty());

    let mut exits = node.exits.lock().unwrap().clone();
    exits.sort_by_key(|(_, to, _)| to.id());
    assert_eq!(exits.len(), 2);
    assert_eq!(exits[0], (pid(1), pid(2), reason.clone()));
    assert_eq!(exits[1], (pid(1), pid(3), reason.clone()));

    let monitor_exits = node.monitor_exits.lock().unwrap();
    assert_eq!(&*monitor_exits, &[(pid(1), pid(4), reference(10), reason)]);
}

#[tokio::test]
async fn broadcast_failures_are_swallowed_per_destination() {
    let node = RecordingNode::default();
    node.refuse.lock().unwrap().push(pid(2));
    let mbox = Mailbox::new(pid(1));
    mbox.deliver(TransportMsg::link(pid(2), pid(1)));
    mbox.deliver(TransportMsg::link(pid(3), pid(1)));

    mbox.close(&node, None, &Term::atom("normal").unwrap());

    let exits = node.exits.lock().unwrap();
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].1, pid(3));
}

#[tokio::test(start_paused = true)]
async fn recv_times_out() {
    let mbox = Mailbox::new(pid(1));
    let err = mbox.recv(Some(Duration::from_millis(50))).await.unwrap_err();
    assert_eq!(err, Error::Timeout);
}

#[tokio::test]
async fn reset_cancels_a_pending_receive() {
    let mbox = Arc::new(Mailbox::new(pid(1)));
    let waiter = {
        let mbox = Arc::clone(&mbox);
        tokio::spawn(async move { mbox.recv(None).await })
    };
    // Let the waiter park before cancelling.
    tokio::task::yield_now().await;
    mbox.queue().reset();
    assert!(matches!(waiter.await.unwrap(), Err(Error::Closed)));
}

#[tokio::test]
async fn recv_on_a_closed_mailbox_fails_fast() {
    let node = RecordingNode::default();
    let mbox = Mailbox::new(pid(1));
    mbox.close(&node, None, &Term::atom("normal").unwrap());
    assert!(matches!(mbox.recv(None).await, Err(Error::Closed)));
}

#[tokio::test]
async fn recv_loop_honors_the_repeat_count() {
    let mbox = Mailbox::new(pid(1));
    for n in 0..5 {
        mbox.deliver(TransportMsg::send(pid(1), payload(n)));
    }
    let mut seen = Vec::new();
    mbox.recv_loop(
        |res| {
            seen.push(res.unwrap().payload().clone());
            true
        },
        None,
        3,
    )
    .await;
    assert_eq!(seen, vec![payload(0), payload(1), payload(2)]);
    assert_eq!(mbox.queue().len(), 2);
}

#[tokio::test]
async fn recv_loop_stops_when_the_handler_declines() {
    let mbox = Mailbox::new(pid(1));
    for n in 0..4 {
        mbox.deliver(TransportMsg::send(pid(1), payload(n)));
    }
    let mut count = 0;
    mbox.recv_loop(
        |_| {
            count += 1;
            count < 2
        },
        None,
        -1,
    )
    .await;
    assert_eq!(count, 2);
}

#[tokio::test]
async fn handler_observes_close_and_the_loop_ends() {
    let node = RecordingNode::default();
    let mbox = Arc::new(Mailbox::new(pid(1)));
    let consumer = {
        let mbox = Arc::clone(&mbox);
        tokio::spawn(async move {
            let mut outcomes = Vec::new();
            mbox.recv_loop(
                |res| {
                    outcomes.push(res.map(|m| m.payload().clone()));
                    true
                },
                None,
                -1,
            )
            .await;
            outcomes
        })
    };
    tokio::task::yield_now().await;
    mbox.close(&node, None, &Term::atom("normal").unwrap());
    let outcomes = consumer.await.unwrap();
    assert_eq!(outcomes, vec![Err(Error::Closed)]);
}

#[tokio::test]
async fn recv_match_delivers_bindings_for_matching_payloads() {
    let mbox = Mailbox::new(pid(1));
    mbox.deliver(TransportMsg::send(pid(1), Term::atom("noise").unwrap()));
    mbox.deliver(TransportMsg::send(
        pid(1),
        Term::tuple(vec![Term::atom("ok").unwrap(), Term::Long(10)]),
    ));

    let pattern = Term::format("{ok, A::int()}").unwrap();
    let var_a = Atom::new("A").unwrap();
    let mut bound: Option<Binding> = None;
    mbox.recv_match(
        &pattern,
        |res| {
            bound = Some(res.unwrap().1);
            false
        },
        None,
        -1,
    )
    .await;
    assert_eq!(bound.unwrap().get(var_a), Some(&Term::Long(10)));
    assert!(mbox.queue().is_empty());
}

#[tokio::test]
async fn registry_names_are_exclusive() {
    let registry = LocalRegistry::new();
    let name = Atom::new("svc_excl_test").unwrap();
    let first = Arc::new(Mailbox::new(pid(1)));
    let second = Arc::new(Mailbox::new(pid(2)));

    registry.register(name, Arc::clone(&first)).unwrap();
    assert_eq!(first.name(), Some(name));
    assert!(registry.register(name, Arc::clone(&second)).is_err());
    assert_eq!(registry.lookup(name).unwrap().pid(), &pid(1));

    assert!(registry.unregister(name));
    assert_eq!(first.name(), None);
    assert!(!registry.unregister(name));
}
