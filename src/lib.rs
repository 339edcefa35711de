#![deny(missing_docs)]

//! Rust bindings for the system `iconv(3)` character set conversion API.
//!
//! The conversion tables live in the platform's iconv implementation (glibc,
//! GNU libiconv, or the macOS system library). This crate loads it at
//! runtime, owns conversion descriptors, and streams input through them with
//! a small fixed-size scratch buffer so memory use does not grow with input
//! size beyond the output itself.
//!
//! ## Quick Start
//! ```no_run
//! use iconv_rs::IconvLibrary;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let library = IconvLibrary::load_default()?;
//!     let mut descriptor = library.open("ISO-8859-1", "UTF-8")?;
//!     let latin1 = descriptor.convert("café".as_bytes())?;
//!     assert_eq!(latin1, b"caf\xe9");
//!     descriptor.close()?;
//!     Ok(())
//! }
//! ```
//!
//! For a single conversion, [`convert_once`] opens and releases the
//! descriptor itself:
//!
//! ```no_run
//! let ascii = iconv_rs::convert_once("€".as_bytes(), "ASCII//TRANSLIT", "UTF-8")?;
//! assert_eq!(ascii, b"EUR");
//! # Ok::<(), iconv_rs::IconvError>(())
//! ```
//!
//! ## Failures Keep Partial Output
//! Conversion errors ([`IconvError::InvalidSequence`],
//! [`IconvError::IncompleteSequence`], [`IconvError::Unrepresentable`])
//! carry the bytes converted before the failure point. Callers wanting a
//! best-effort result can read them with [`IconvError::partial_output`];
//! strict callers treat any error as failing the whole conversion.
//!
//! ## Other Engines
//! The streaming loop only talks to the [`Engine`] trait. [`IconvLibrary`] is
//! the native implementation; [`Descriptor::open`] accepts any other.
//!
//! ## Environment Variables
//! - `ICONV_LIBRARY_PATH`: explicit dynamic library path.

mod charset;
mod config;
mod constants;
mod descriptor;
mod discovery;
mod engine;
mod error;
mod native;
mod runtime;
mod transcoder;
mod types;

pub use charset::Charset;
pub use constants::{ICONV_IGNORE, ICONV_LIBRARY_PATH_ENV, ICONV_TRANSLIT, SCRATCH_BUFFER_SIZE};
pub use descriptor::{convert_once_with, Descriptor};
pub use engine::{Engine, StepOutcome, StepReport};
pub use error::{IconvError, Result};
pub use runtime::{convert_once, IconvLibrary, NativeHandle};
pub use types::{Conversion, IconvConfig};

#[cfg(test)]
mod test_support;
