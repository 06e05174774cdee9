// src/error.rs

use core::fmt;

/// Error kinds produced by the codec.
///
/// Each variant maps to one signal in the host error taxonomy the codec was ported
/// from: a fallible operation returns one of these and, when a context is supplied,
/// pushes the same kind onto it via [`ErrorContext::push_error`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TlvError {
    /// Null/unusable input: identity not found, a setter called with a value that
    /// can never be valid for the node's current state.
    InvalidArgument,
    /// Byte stream does not decode to a valid TLV: truncated header, short payload,
    /// trailing bytes, or a scan that consumed zero bytes.
    InvalidFormat,
    /// Output buffer smaller than the encoded size, or a requested payload length
    /// that would exceed the 65,535-byte wire limit.
    BufferOverflow { needed: usize, available: usize },
    /// Allocation failure.
    OutOfMemory,
    /// Operation required the raw view but the node was nested, or vice versa.
    PayloadTypeMismatch,
    /// Integrity assertion: a condition that must not happen absent a
    /// serializer/parser disagreement.
    Unknown,
}

impl fmt::Display for TlvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::InvalidFormat => write!(f, "invalid TLV format"),
            Self::BufferOverflow { needed, available } => write!(
                f,
                "buffer overflow: needed {} bytes, {} available",
                needed, available
            ),
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::PayloadTypeMismatch => write!(f, "payload type mismatch (raw/nested view)"),
            Self::Unknown => write!(f, "unknown/integrity error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TlvError {}

/// Sink for diagnostics, matching the reference implementation's "report an error
/// kind plus optional message against a caller-supplied context handle" contract.
///
/// The codec's own fallible operations always return `Result<T, TlvError>`
/// regardless of whether a context is supplied; pushing onto a context is opt-in
/// instrumentation layered on top, not the primary propagation channel.
pub trait ErrorContext {
    fn clear_errors(&mut self);
    fn push_error(&mut self, kind: TlvError, msg: Option<&str>);
}

/// A `Vec`-backed [`ErrorContext`] that simply remembers everything pushed to it.
/// Used by the test suite; a real caller would likely bridge to its own diagnostic
/// sink instead.
#[derive(Debug, Default, Clone)]
pub struct CollectingContext {
    pub errors: alloc::vec::Vec<(TlvError, Option<alloc::string::String>)>,
}

impl CollectingContext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ErrorContext for CollectingContext {
    fn clear_errors(&mut self) {
        self.errors.clear();
    }

    fn push_error(&mut self, kind: TlvError, msg: Option<&str>) {
        self.errors.push((kind, msg.map(alloc::string::String::from)));
    }
}
