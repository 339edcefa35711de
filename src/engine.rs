//! Interface to the transcoding primitive driven by the conversion loop.
//!
//! The loop in [`crate::Descriptor`] never touches charset tables itself. It
//! calls an [`Engine`] one step at a time and reacts to the [`StepOutcome`]
//! each step reports. [`crate::IconvLibrary`] is the engine backed by the
//! system `iconv(3)`.

use crate::error::Result;

/// How a single engine step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Everything offered was converted and fit into the output.
    Success,
    /// The output region filled up before the engine finished. Not an error:
    /// the caller drains the output and calls again with the rest.
    OutputBufferFull,
    /// The input holds a sequence that is invalid in the source charset.
    InvalidSequence,
    /// The input ends in the middle of a multi-byte sequence.
    IncompleteSequence,
    /// A valid input character has no representation in the target charset.
    Unrepresentable,
    /// Any other engine failure, with the engine's raw error code.
    EngineFailure(i32),
}

/// Progress made by one engine step.
///
/// Replaces the in/out pointer-and-length mutation of the native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    /// Input bytes consumed from the front of the offered input.
    pub consumed: usize,
    /// Output bytes written to the front of the offered output region.
    pub produced: usize,
    /// How the step ended.
    pub outcome: StepOutcome,
}

impl StepReport {
    /// A report for a step that ended with `outcome`.
    pub fn new(consumed: usize, produced: usize, outcome: StepOutcome) -> Self {
        Self {
            consumed,
            produced,
            outcome,
        }
    }
}

/// A stateful, byte-oriented transcoding primitive.
///
/// Handles are created by [`Engine::open`] and destroyed by
/// [`Engine::close`], which takes the handle by value so it cannot be closed
/// twice. A handle carries mutable shift state; every call that touches it
/// takes `&mut`.
pub trait Engine {
    /// Converter state for one charset pair.
    type Handle;

    /// Creates a converter producing `to_charset` from `from_charset`.
    ///
    /// Identifiers are passed through unmodified, modifiers included.
    fn open(&self, to_charset: &str, from_charset: &str) -> Result<Self::Handle>;

    /// Converts a prefix of `input` into a prefix of `output`.
    fn step(&self, handle: &mut Self::Handle, input: &[u8], output: &mut [u8]) -> StepReport;

    /// Writes the sequence returning a stateful encoding to its initial
    /// shift state. Stateless converters write nothing.
    fn flush(&self, handle: &mut Self::Handle, output: &mut [u8]) -> StepReport;

    /// Discards shift state without producing output.
    fn reset(&self, handle: &mut Self::Handle);

    /// Releases the converter.
    fn close(&self, handle: Self::Handle) -> Result<()>;
}

impl<E: Engine + ?Sized> Engine for &E {
    type Handle = E::Handle;

    fn open(&self, to_charset: &str, from_charset: &str) -> Result<Self::Handle> {
        (**self).open(to_charset, from_charset)
    }

    fn step(&self, handle: &mut Self::Handle, input: &[u8], output: &mut [u8]) -> StepReport {
        (**self).step(handle, input, output)
    }

    fn flush(&self, handle: &mut Self::Handle, output: &mut [u8]) -> StepReport {
        (**self).flush(handle, output)
    }

    fn reset(&self, handle: &mut Self::Handle) {
        (**self).reset(handle)
    }

    fn close(&self, handle: Self::Handle) -> Result<()> {
        (**self).close(handle)
    }
}
