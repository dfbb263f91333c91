use std::fmt;

use bitflags::bitflags;

use crate::ident::Pid;

bitflags! {
    /// The flag word of a sequential-trace token.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct TraceFlags: u32 {
        const SEND = 1;
        const RECEIVE = 1 << 1;
        const PRINT = 1 << 2;
        const TIMESTAMP = 1 << 3;
        const STRICT_MONOTONIC_TIMESTAMP = 1 << 4;
        const MONOTONIC_TIMESTAMP = 1 << 5;
    }
}

/// A sequential-trace token, carried alongside traced transport messages.
/// On the wire it travels as the 5-tuple `{Flags, Label, Serial, From, Prev}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Trace {
    flags: TraceFlags,
    label: i64,
    serial: i64,
    from: Pid,
    prev: i64,
}

impl Trace {
    pub fn new(flags: TraceFlags, label: i64, serial: i64, from: Pid, prev: i64) -> Self {
        Self {
            flags,
            label,
            serial,
            from,
            prev,
        }
    }

    #[must_use]
    pub fn flags(&self) -> TraceFlags {
        self.flags
    }

    #[must_use]
    pub fn label(&self) -> i64 {
        self.label
    }

    #[must_use]
    pub fn serial(&self) -> i64 {
        self.serial
    }

    #[must_use]
    pub fn from(&self) -> &Pid {
        &self.from
    }

    #[must_use]
    pub fn prev(&self) -> i64 {
        self.prev
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{},{},{},{},{}}}",
            self.flags.bits(),
            self.label,
            self.serial,
            self.from,
            self.prev
        )
    }
}

#[test]
fn test_trace_display_is_tuple_form() {
    let from = Pid::new("a@h", 1, 2, 0).unwrap();
    let t = Trace::new(TraceFlags::SEND | TraceFlags::PRINT, 7, 9, from, 8);
    assert_eq!(t.to_string(), "{5,7,9,#Pid<a@h.1.2>,8}");
}
