use thiserror::Error;

use crate::atom::Atom;
use crate::term::TermKind;

/// Everything that can go wrong across the term model, the codec, and the
/// mailbox layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A caller-supplied value was out of range for the operation.
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// A typed accessor was called on a term of a different kind.
    #[error("term is {actual}, not {expected}")]
    WrongType { expected: TermKind, actual: TermKind },

    /// Malformed wire input. The offset is the byte position the decoder
    /// had reached when it gave up.
    #[error("decode failed at byte {offset}: {reason}")]
    Decode { reason: String, offset: usize },

    /// The term cannot be put on the wire.
    #[error("encode failed: {0}")]
    Encode(String),

    /// The process-wide atom table is saturated.
    #[error("atom table full")]
    TableFull,

    /// Pattern substitution hit a variable with no binding.
    #[error("variable '{0}' is unbound")]
    Unbound(Atom),

    /// The mailbox was closed or the pending receive was cancelled.
    #[error("mailbox closed")]
    Closed,

    /// The receive deadline elapsed before a message arrived.
    #[error("receive timed out")]
    Timeout,
}

impl Error {
    pub(crate) fn bad_arg(msg: impl Into<String>) -> Self {
        Self::BadArgument(msg.into())
    }

    pub(crate) fn decode(reason: impl Into<String>, offset: usize) -> Self {
        Self::Decode {
            reason: reason.into(),
            offset,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
