use std::fmt;

use crate::charset::Charset;
use crate::constants::SCRATCH_BUFFER_SIZE;
use crate::engine::Engine;
use crate::error::{IconvError, Result};
use crate::runtime::IconvLibrary;
use crate::transcoder::{drain, drain_flush};
use crate::types::{validate_scratch_capacity, Conversion};

/// An open conversion from one charset to another.
///
/// The descriptor owns its converter state. Release it with
/// [`Descriptor::close`] to observe release failures; a descriptor that is
/// dropped without being closed is released by `Drop`. Converting calls take
/// `&mut self` because every step mutates the converter's shift state, so
/// concurrent conversions each need their own descriptor.
pub struct Descriptor<E: Engine = IconvLibrary> {
    engine: E,
    handle: Option<E::Handle>,
    to_charset: String,
    from_charset: String,
    scratch_capacity: usize,
}

impl<E: Engine> Descriptor<E> {
    /// Opens a converter producing `to_charset` from `from_charset` on
    /// `engine`.
    pub fn open(engine: E, to_charset: &str, from_charset: &str) -> Result<Self> {
        let handle = engine.open(to_charset, from_charset)?;
        tracing::debug!(to = to_charset, from = from_charset, "opened descriptor");
        Ok(Self {
            engine,
            handle: Some(handle),
            to_charset: to_charset.to_string(),
            from_charset: from_charset.to_string(),
            scratch_capacity: SCRATCH_BUFFER_SIZE,
        })
    }

    /// Replaces the scratch buffer capacity used by later conversions.
    pub fn with_scratch_capacity(mut self, scratch_capacity: usize) -> Result<Self> {
        self.scratch_capacity = validate_scratch_capacity(scratch_capacity)?;
        Ok(self)
    }

    /// Target identifier, exactly as passed to [`Self::open`].
    pub fn to_charset(&self) -> &str {
        &self.to_charset
    }

    /// Source identifier, exactly as passed to [`Self::open`].
    pub fn from_charset(&self) -> &str {
        &self.from_charset
    }

    /// Scratch buffer capacity used per conversion call.
    pub fn scratch_capacity(&self) -> usize {
        self.scratch_capacity
    }

    /// Whether the target identifier requests transliteration.
    pub fn is_transliterating(&self) -> bool {
        Charset::parse(&self.to_charset).is_ok_and(|charset| charset.is_transliterating())
    }

    /// Converts `input`, returning the converted bytes.
    ///
    /// Empty input returns empty output without calling the engine. On
    /// failure the error carries everything converted before the failure
    /// point; see [`IconvError::partial_output`].
    pub fn convert(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.convert_detailed(input)
            .map(|conversion| conversion.output)
    }

    /// Like [`Self::convert`], also reporting the number of engine steps.
    pub fn convert_detailed(&mut self, input: &[u8]) -> Result<Conversion> {
        let handle = self.handle.as_mut().ok_or_else(released)?;
        drain(&self.engine, handle, input, self.scratch_capacity)
    }

    /// Returns the bytes that bring a stateful target encoding back to its
    /// initial shift state (e.g. the trailing `ESC ( B` of ISO-2022-JP).
    ///
    /// Call it once after the last [`Self::convert`] of a document.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        let handle = self.handle.as_mut().ok_or_else(released)?;
        drain_flush(&self.engine, handle, self.scratch_capacity)
    }

    /// Discards shift state so the next conversion starts fresh.
    pub fn reset(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            self.engine.reset(handle);
        }
    }

    /// Releases the converter.
    pub fn close(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => {
                tracing::debug!(
                    to = %self.to_charset,
                    from = %self.from_charset,
                    "closing descriptor"
                );
                self.engine.close(handle)
            }
            None => Ok(()),
        }
    }
}

fn released() -> IconvError {
    IconvError::resource("descriptor was already released")
}

impl<E: Engine> Drop for Descriptor<E> {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(error) = self.engine.close(handle) {
            tracing::warn!(
                to = %self.to_charset,
                from = %self.from_charset,
                %error,
                "failed to release dropped descriptor"
            );
        }
    }
}

impl<E: Engine> fmt::Debug for Descriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("to_charset", &self.to_charset)
            .field("from_charset", &self.from_charset)
            .field("scratch_capacity", &self.scratch_capacity)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

/// Opens a descriptor on `engine`, converts `input` and releases the
/// descriptor on every path.
///
/// A conversion error takes precedence over a release error.
pub fn convert_once_with<E: Engine>(
    engine: E,
    input: &[u8],
    to_charset: &str,
    from_charset: &str,
    scratch_capacity: usize,
) -> Result<Vec<u8>> {
    let mut descriptor =
        Descriptor::open(engine, to_charset, from_charset)?.with_scratch_capacity(scratch_capacity)?;
    let converted = descriptor.convert(input);
    let closed = descriptor.close();
    let output = converted?;
    closed?;
    Ok(output)
}
