use std::fmt;

use num_enum::TryFromPrimitive;

use crate::atom::Atom;
use crate::error::Error;
use crate::ident::{Pid, Ref};
use crate::term::{Term, UNDEFINED_TERM};
use crate::trace::{Trace, TraceFlags};

/// Control-message tags of the distribution protocol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum CtrlKind {
    Link = 1,
    Send = 2,
    Exit = 3,
    Unlink = 4,
    NodeLink = 5,
    RegSend = 6,
    GroupLeader = 7,
    Exit2 = 8,
    SendTt = 12,
    ExitTt = 13,
    RegSendTt = 16,
    Exit2Tt = 18,
    MonitorP = 19,
    DemonitorP = 20,
    MonitorPExit = 21,
}

impl CtrlKind {
    /// The exit family removes the sender from the recipient's links and
    /// still reaches the consumer.
    #[must_use]
    pub fn is_exit(self) -> bool {
        matches!(self, Self::Exit | Self::Exit2 | Self::ExitTt | Self::Exit2Tt)
    }

    /// Kinds whose wire form is followed by a separate payload term.
    #[must_use]
    pub fn carries_payload(self) -> bool {
        matches!(
            self,
            Self::Send | Self::RegSend | Self::SendTt | Self::RegSendTt
        )
    }

    /// Kinds whose control tuple embeds a reason term; it doubles as the
    /// message payload on delivery.
    #[must_use]
    pub fn carries_reason(self) -> bool {
        self.is_exit() || self == Self::MonitorPExit
    }
}

/// The envelope moved between nodes: one control-message tag, addressing,
/// optional reference and trace token, and the payload term the envelope
/// owns.
///
/// Accessors are total; a field the tag has no use for is simply `None`
/// (or the undefined term for the payload).
#[derive(Debug, Clone)]
pub struct TransportMsg {
    kind: CtrlKind,
    from: Option<Pid>,
    to: Option<Pid>,
    to_name: Option<Atom>,
    reference: Option<Ref>,
    token: Option<Trace>,
    payload: Term,
    error: Option<Error>,
}

impl TransportMsg {
    /// A bare envelope of the given kind; the typed constructors below fill
    /// in the fields each tag uses.
    #[must_use]
    pub fn new(kind: CtrlKind) -> Self {
        Self {
            kind,
            from: None,
            to: None,
            to_name: None,
            reference: None,
            token: None,
            payload: Term::Undefined,
            error: None,
        }
    }

    #[must_use]
    pub fn send(to: Pid, payload: Term) -> Self {
        let mut msg = Self::new(CtrlKind::Send);
        msg.to = Some(to);
        msg.payload = payload;
        msg
    }

    #[must_use]
    pub fn reg_send(from: Pid, to_name: Atom, payload: Term) -> Self {
        let mut msg = Self::new(CtrlKind::RegSend);
        msg.from = Some(from);
        msg.to_name = Some(to_name);
        msg.payload = payload;
        msg
    }

    #[must_use]
    pub fn link(from: Pid, to: Pid) -> Self {
        let mut msg = Self::new(CtrlKind::Link);
        msg.from = Some(from);
        msg.to = Some(to);
        msg
    }

    #[must_use]
    pub fn unlink(from: Pid, to: Pid) -> Self {
        let mut msg = Self::new(CtrlKind::Unlink);
        msg.from = Some(from);
        msg.to = Some(to);
        msg
    }

    #[must_use]
    pub fn exit(from: Pid, to: Pid, reason: Term) -> Self {
        let mut msg = Self::new(CtrlKind::Exit);
        msg.from = Some(from);
        msg.to = Some(to);
        msg.payload = reason;
        msg
    }

    #[must_use]
    pub fn exit2(from: Pid, to: Pid, reason: Term) -> Self {
        let mut msg = Self::exit(from, to, reason);
        msg.kind = CtrlKind::Exit2;
        msg
    }

    #[must_use]
    pub fn monitor(from: Pid, to: Pid, reference: Ref) -> Self {
        let mut msg = Self::new(CtrlKind::MonitorP);
        msg.from = Some(from);
        msg.to = Some(to);
        msg.reference = Some(reference);
        msg
    }

    #[must_use]
    pub fn demonitor(from: Pid, to: Pid, reference: Ref) -> Self {
        let mut msg = Self::monitor(from, to, reference);
        msg.kind = CtrlKind::DemonitorP;
        msg
    }

    #[must_use]
    pub fn monitor_exit(from: Pid, to: Pid, reference: Ref, reason: Term) -> Self {
        let mut msg = Self::new(CtrlKind::MonitorPExit);
        msg.from = Some(from);
        msg.to = Some(to);
        msg.reference = Some(reference);
        msg.payload = reason;
        msg
    }

    #[must_use]
    pub fn group_leader(from: Pid, to: Pid) -> Self {
        let mut msg = Self::new(CtrlKind::GroupLeader);
        msg.from = Some(from);
        msg.to = Some(to);
        msg
    }

    /// Attaches a sequential-trace token, upgrading the tag to its traced
    /// variant where one exists.
    #[must_use]
    pub fn with_token(mut self, token: Trace) -> Self {
        self.kind = match self.kind {
            CtrlKind::Send => CtrlKind::SendTt,
            CtrlKind::RegSend => CtrlKind::RegSendTt,
            CtrlKind::Exit => CtrlKind::ExitTt,
            CtrlKind::Exit2 => CtrlKind::Exit2Tt,
            other => other,
        };
        self.token = Some(token);
        self
    }

    #[must_use]
    pub fn kind(&self) -> CtrlKind {
        self.kind
    }

    #[must_use]
    pub fn sender(&self) -> Option<&Pid> {
        self.from.as_ref()
    }

    #[must_use]
    pub fn recipient(&self) -> Option<&Pid> {
        self.to.as_ref()
    }

    #[must_use]
    pub fn recipient_name(&self) -> Option<Atom> {
        self.to_name
    }

    #[must_use]
    pub fn reference(&self) -> Option<&Ref> {
        self.reference.as_ref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&Trace> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn payload(&self) -> &Term {
        &self.payload
    }

    /// For the exit family and monitor-exit this is the carried reason;
    /// other kinds have none.
    #[must_use]
    pub fn reason(&self) -> &Term {
        if self.kind.carries_reason() {
            &self.payload
        } else {
            &UNDEFINED_TERM
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub(crate) fn set_error(&mut self, error: Error) {
        self.error = Some(error);
    }

    /// Rebuilds the envelope from a decoded control tuple plus the
    /// follow-on payload term, when the tag calls for one.
    pub fn from_control(ctrl: &Term, payload: Option<Term>) -> Result<Self, Error> {
        let elems = ctrl
            .as_tuple()
            .map_err(|_| Error::bad_arg("control message is not a tuple"))?;
        let arity = elems.len();
        let field = |i: usize| -> Result<&Term, Error> {
            elems.get(i).ok_or_else(|| {
                Error::bad_arg(format!("control tuple has {arity} elements, wanted {}", i + 1))
            })
        };
        let tag_value = field(0)?.to_long()?;
        let tag = u8::try_from(tag_value)
            .ok()
            .and_then(|t| CtrlKind::try_from(t).ok())
            .ok_or_else(|| Error::bad_arg(format!("unknown control tag {tag_value}")))?;

        let mut msg = Self::new(tag);
        match tag {
            CtrlKind::Link | CtrlKind::Unlink | CtrlKind::GroupLeader => {
                msg.from = Some(field(1)?.as_pid()?.clone());
                msg.to = Some(field(2)?.as_pid()?.clone());
            }
            CtrlKind::NodeLink => {}
            CtrlKind::Send => {
                msg.to = Some(field(2)?.as_pid()?.clone());
            }
            CtrlKind::SendTt => {
                msg.to = Some(field(2)?.as_pid()?.clone());
                msg.token = Some(trace_token(field(3)?)?);
            }
            CtrlKind::RegSend => {
                msg.from = Some(field(1)?.as_pid()?.clone());
                msg.to_name = Some(field(3)?.to_atom()?);
            }
            CtrlKind::RegSendTt => {
                msg.from = Some(field(1)?.as_pid()?.clone());
                msg.to_name = Some(field(3)?.to_atom()?);
                msg.token = Some(trace_token(field(4)?)?);
            }
            CtrlKind::Exit | CtrlKind::Exit2 => {
                msg.from = Some(field(1)?.as_pid()?.clone());
                msg.to = Some(field(2)?.as_pid()?.clone());
                msg.payload = field(3)?.clone();
            }
            CtrlKind::ExitTt | CtrlKind::Exit2Tt => {
                msg.from = Some(field(1)?.as_pid()?.clone());
                msg.to = Some(field(2)?.as_pid()?.clone());
                msg.token = Some(trace_token(field(3)?)?);
                msg.payload = field(4)?.clone();
            }
            CtrlKind::MonitorP | CtrlKind::DemonitorP => {
                msg.from = Some(field(1)?.as_pid()?.clone());
                address(&mut msg, field(2)?)?;
                msg.reference = Some(field(3)?.as_reference()?.clone());
            }
            CtrlKind::MonitorPExit => {
                msg.from = Some(field(1)?.as_pid()?.clone());
                address(&mut msg, field(2)?)?;
                msg.reference = Some(field(3)?.as_reference()?.clone());
                msg.payload = field(4)?.clone();
            }
        }
        if tag.carries_payload() {
            msg.payload = payload.ok_or_else(|| {
                Error::bad_arg(format!("control tag {tag:?} arrived without its payload"))
            })?;
        }
        Ok(msg)
    }

    /// The control tuple this envelope puts on the wire. The payload for
    /// the send family travels as a separate term after it.
    pub fn to_control(&self) -> Result<Term, Error> {
        let tag = Term::Long(i64::from(self.kind as u8));
        let from = || -> Result<Term, Error> {
            self.from
                .clone()
                .map(Term::from)
                .ok_or_else(|| Error::bad_arg("control message needs a sender"))
        };
        let to = || -> Result<Term, Error> {
            self.to
                .clone()
                .map(Term::from)
                .ok_or_else(|| Error::bad_arg("control message needs a recipient"))
        };
        let name = || -> Result<Term, Error> {
            self.to_name
                .map(Term::from)
                .ok_or_else(|| Error::bad_arg("control message needs a recipient name"))
        };
        let reference = || -> Result<Term, Error> {
            self.reference
                .clone()
                .map(Term::from)
                .ok_or_else(|| Error::bad_arg("control message needs a reference"))
        };
        let token = || -> Result<Term, Error> {
            self.token
                .clone()
                .map(Term::from)
                .ok_or_else(|| Error::bad_arg("control message needs a trace token"))
        };
        // Monitor kinds address the target by pid or registered name.
        let target = || -> Result<Term, Error> {
            if let Some(p) = &self.to {
                return Ok(Term::from(p.clone()));
            }
            self.to_name
                .map(Term::from)
                .ok_or_else(|| Error::bad_arg("control message needs a recipient"))
        };
        let unused = Term::Atom(Atom::EMPTY);

        Ok(match self.kind {
            CtrlKind::Link | CtrlKind::Unlink | CtrlKind::GroupLeader => {
                Term::tuple(vec![tag, from()?, to()?])
            }
            CtrlKind::NodeLink => Term::tuple(vec![tag]),
            CtrlKind::Send => Term::tuple(vec![tag, unused, to()?]),
            CtrlKind::SendTt => Term::tuple(vec![tag, unused, to()?, token()?]),
            CtrlKind::RegSend => Term::tuple(vec![tag, from()?, unused, name()?]),
            CtrlKind::RegSendTt => Term::tuple(vec![tag, from()?, unused, name()?, token()?]),
            CtrlKind::Exit | CtrlKind::Exit2 => {
                Term::tuple(vec![tag, from()?, to()?, self.payload.clone()])
            }
            CtrlKind::ExitTt | CtrlKind::Exit2Tt => {
                Term::tuple(vec![tag, from()?, to()?, token()?, self.payload.clone()])
            }
            CtrlKind::MonitorP | CtrlKind::DemonitorP => {
                Term::tuple(vec![tag, from()?, target()?, reference()?])
            }
            CtrlKind::MonitorPExit => {
                Term::tuple(vec![tag, from()?, target()?, reference()?, self.payload.clone()])
            }
        })
    }
}

/// Monitor addressing accepts a pid or a registered name.
fn address(msg: &mut TransportMsg, term: &Term) -> Result<(), Error> {
    match term {
        Term::Pid(p) => msg.to = Some(Pid::clone(p)),
        Term::Atom(a) => msg.to_name = Some(*a),
        _ => {
            return Err(Error::bad_arg(format!(
                "monitor address is {}, not a pid or name",
                term.kind()
            )));
        }
    }
    Ok(())
}

/// The wire trace token is the 5-tuple `{Flags, Label, Serial, From, Prev}`;
/// an already-typed token is taken as-is.
fn trace_token(term: &Term) -> Result<Trace, Error> {
    if let Term::Trace(t) = term {
        return Ok(Trace::clone(t));
    }
    let elems = term.as_tuple()?;
    if elems.len() != 5 {
        return Err(Error::bad_arg(format!(
            "trace token tuple has arity {}, expected 5",
            elems.len()
        )));
    }
    let bits = u32::try_from(elems[0].to_long()?)
        .map_err(|_| Error::bad_arg("trace flag word out of range"))?;
    Ok(Trace::new(
        TraceFlags::from_bits_retain(bits),
        elems[1].to_long()?,
        elems[2].to_long()?,
        elems[3].as_pid()?.clone(),
        elems[4].to_long()?,
    ))
}

impl fmt::Display for TransportMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(from) = &self.from {
            write!(f, " from {from}")?;
        }
        if let Some(to) = &self.to {
            write!(f, " to {to}")?;
        } else if let Some(name) = &self.to_name {
            write!(f, " to {name}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: u32) -> Pid {
        Pid::new("a@h", id, 0, 1).unwrap()
    }

    #[test]
    fn send_round_trips_through_control_tuple() {
        let msg = TransportMsg::send(pid(7), Term::Long(42));
        let ctrl = msg.to_control().unwrap();
        assert_eq!(ctrl.as_tuple().unwrap().len(), 3);
        let back = TransportMsg::from_control(&ctrl, Some(Term::Long(42))).unwrap();
        assert_eq!(back.kind(), CtrlKind::Send);
        assert_eq!(back.recipient(), Some(&pid(7)));
        assert_eq!(back.payload(), &Term::Long(42));
        assert_eq!(back.sender(), None);
    }

    #[test]
    fn exit_reason_rides_in_the_control_tuple() {
        let reason = Term::atom("normal").unwrap();
        let msg = TransportMsg::exit(pid(1), pid(2), reason.clone());
        let ctrl = msg.to_control().unwrap();
        let back = TransportMsg::from_control(&ctrl, None).unwrap();
        assert_eq!(back.kind(), CtrlKind::Exit);
        assert_eq!(back.reason(), &reason);
        assert_eq!(back.payload(), &reason);
    }

    #[test]
    fn traced_send_upgrades_kind() {
        let token = Trace::new(TraceFlags::SEND, 1, 2, pid(1), 0);
        let msg = TransportMsg::send(pid(7), Term::Long(1)).with_token(token.clone());
        assert_eq!(msg.kind(), CtrlKind::SendTt);
        let ctrl = msg.to_control().unwrap();
        let back = TransportMsg::from_control(&ctrl, Some(Term::Long(1))).unwrap();
        assert_eq!(back.token(), Some(&token));
    }

    #[test]
    fn monitor_accepts_name_addressing() {
        let reference = Ref::new("a@h", &[1, 2], 0).unwrap();
        let name = Atom::new("zzz_registered").unwrap();
        let ctrl = Term::tuple(vec![
            Term::Long(19),
            Term::from(pid(1)),
            Term::from(name),
            Term::from(reference.clone()),
        ]);
        let msg = TransportMsg::from_control(&ctrl, None).unwrap();
        assert_eq!(msg.kind(), CtrlKind::MonitorP);
        assert_eq!(msg.recipient_name(), Some(name));
        assert_eq!(msg.reference(), Some(&reference));
    }

    #[test]
    fn inapplicable_fields_default() {
        let msg = TransportMsg::link(pid(1), pid(2));
        assert_eq!(msg.reference(), None);
        assert_eq!(msg.token(), None);
        assert_eq!(msg.recipient_name(), None);
        assert_eq!(msg.payload(), &Term::Undefined);
        assert_eq!(msg.reason(), &Term::Undefined);
        assert!(msg.error().is_none());
    }

    #[test]
    fn missing_payload_is_rejected() {
        let msg = TransportMsg::send(pid(7), Term::Long(1));
        let ctrl = msg.to_control().unwrap();
        assert!(TransportMsg::from_control(&ctrl, None).is_err());
    }
}
