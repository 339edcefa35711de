//! Constants shared by the conversion loop and the native bindings.

/// Default capacity, in bytes, of the scratch output buffer used by one
/// conversion call.
///
/// The value bounds per-call memory; it changes the number of engine calls
/// needed for large inputs, never the converted bytes.
pub const SCRATCH_BUFFER_SIZE: usize = 512;

/// Target charset modifier requesting transliteration of unrepresentable
/// characters.
pub const ICONV_TRANSLIT: &str = "//TRANSLIT";
/// Target charset modifier requesting that unconvertible characters be
/// silently dropped.
pub const ICONV_IGNORE: &str = "//IGNORE";

/// Environment variable naming an explicit iconv dynamic library.
pub const ICONV_LIBRARY_PATH_ENV: &str = "ICONV_LIBRARY_PATH";

/// Charset used by the native engine to probe whether an input sequence is
/// valid in its source charset.
pub(crate) const PROBE_CHARSET: &str = "UTF-8";
/// Input bytes handed to the probe converter; longer than any single
/// character in the charsets iconv ships.
pub(crate) const PROBE_INPUT_LIMIT: usize = 16;
