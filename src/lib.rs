//! Erlang external term format and node mailbox dispatch in Rust

/// Process-wide atom interning
pub mod atom;
mod bytes;
/// Crate-wide error kinds
pub mod error;
/// Node-scoped identifiers (pid, port, reference)
pub mod ident;
/// Mailbox dispatch and link/monitor bookkeeping
pub mod mailbox;
/// Transport envelopes and the control-message set
pub mod message;
/// Collaborator traits for the connection layer
pub mod node;
/// Variable bindings and structural pattern matching
pub mod pattern;
/// The asynchronous mailbox queue
pub mod queue;
/// The term variant
pub mod term;
/// Sequential-trace tokens
pub mod trace;

/// External term format codec
pub mod wire {
    /// Decoder
    pub mod decode;
    /// Encoder
    pub mod encode;
    /// Opcode tables
    pub mod tag;
}

pub use self::atom::Atom;
pub use self::error::Error;
pub use self::ident::{Pid, Port, Ref};
pub use self::mailbox::Mailbox;
pub use self::message::{CtrlKind, TransportMsg};
pub use self::node::{LocalRegistry, NodeControl, Registry};
pub use self::pattern::{Binding, apply, match_term};
pub use self::queue::MsgQueue;
pub use self::term::{List, ListBuilder, Map, Term, TermKind, TupleBuilder, Var};
pub use self::trace::{Trace, TraceFlags};
pub use self::wire::decode::decode;
pub use self::wire::encode::{encode, encode_size};
