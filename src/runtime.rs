use std::env;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::{IconvHandle, E2BIG, EILSEQ, EINVAL, ICONV_INVALID_HANDLE};
use crate::constants::{ICONV_LIBRARY_PATH_ENV, PROBE_CHARSET, PROBE_INPUT_LIMIT};
use crate::descriptor::{convert_once_with, Descriptor};
use crate::discovery::{default_library_candidates, discover_default_library_path};
use crate::engine::{Engine, StepOutcome, StepReport};
use crate::error::{IconvError, Result};
use crate::native::{
    call_iconv, describe_errno, discard_through, platform_errno, DynamicLibrary, IconvApi,
    LoadedLibrary, RawCall,
};
use crate::types::{validate_scratch_capacity, IconvConfig};

/// Handle to a loaded iconv dynamic library plus resolved function table.
///
/// This is the [`Engine`] backed by the system `iconv(3)`. Clones share the
/// loaded library.
#[derive(Clone)]
pub struct IconvLibrary {
    inner: Arc<LoadedLibrary>,
    scratch_capacity: usize,
}

impl IconvLibrary {
    /// Loads an iconv dynamic library from an explicit path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let origin = path.as_ref().display().to_string();
        let library = DynamicLibrary::open(path)?;
        Self::from_library(library, origin)
    }

    /// Loads iconv from common platform-specific locations and caches it.
    pub fn load_default() -> Result<Self> {
        static DEFAULT_LIBRARY: Mutex<Option<Arc<LoadedLibrary>>> = Mutex::new(None);

        let mut guard = DEFAULT_LIBRARY.lock().map_err(|_| {
            IconvError::LibraryLoad("failed to lock default library cache".to_string())
        })?;

        if let Some(inner) = guard.as_ref() {
            return Ok(Self::from_inner(inner.clone()));
        }

        let loaded = Self::load_default_internal()?;
        *guard = Some(loaded.inner.clone());
        Ok(loaded)
    }

    fn load_default_internal() -> Result<Self> {
        let mut errors = Vec::new();

        if let Some(path) = discover_default_library_path() {
            match Self::load(&path) {
                Ok(loaded) => return Ok(loaded),
                Err(error) => errors.push(format!("{}: {}", path.display(), error)),
            }
        }

        for candidate in default_library_candidates() {
            let library = match DynamicLibrary::open(candidate) {
                Ok(library) => library,
                Err(error) => {
                    errors.push(format!("{candidate}: {error}"));
                    continue;
                }
            };

            match Self::from_library(library, candidate.to_string()) {
                Ok(loaded) => return Ok(loaded),
                Err(error) => errors.push(format!("{candidate}: {error}")),
            }
        }

        Err(IconvError::LibraryLoad(format!(
            "set {ICONV_LIBRARY_PATH_ENV} to the dynamic library path. tried: {}",
            errors.join(" | ")
        )))
    }

    /// Loads from `ICONV_LIBRARY_PATH` if set, otherwise falls back to
    /// [`Self::load_default`].
    ///
    /// Libraries are loaded once per distinct path and then reused.
    pub fn load_from_env_or_default() -> Result<Self> {
        if let Some(path) = env::var_os(ICONV_LIBRARY_PATH_ENV) {
            return Self::load_cached(PathBuf::from(path));
        }
        Self::load_default()
    }

    fn load_cached(path: PathBuf) -> Result<Self> {
        static LOADED_LIBRARIES: Mutex<Vec<(PathBuf, Arc<LoadedLibrary>)>> =
            Mutex::new(Vec::new());

        let mut guard = LOADED_LIBRARIES.lock().map_err(|_| {
            IconvError::LibraryLoad("failed to lock library cache".to_string())
        })?;

        if let Some((_, inner)) = guard.iter().find(|(loaded, _)| *loaded == path) {
            return Ok(Self::from_inner(inner.clone()));
        }

        let loaded = Self::load(&path)?;
        guard.push((path, loaded.inner.clone()));
        Ok(loaded)
    }

    /// Loads the configured library (or the default one) and applies the
    /// configured scratch capacity.
    pub fn from_config(config: IconvConfig) -> Result<Self> {
        let scratch_capacity = config.validated_scratch_capacity()?;
        let library = match config.library_path.as_ref() {
            Some(path) => Self::load(path)?,
            None => Self::load_default()?,
        };
        Ok(Self {
            scratch_capacity,
            ..library
        })
    }

    /// Path or soname the library was loaded from.
    pub fn origin(&self) -> &str {
        &self.inner.origin
    }

    /// Scratch capacity given to descriptors opened through [`Self::open`].
    pub fn scratch_capacity(&self) -> usize {
        self.scratch_capacity
    }

    /// Sets the scratch capacity for descriptors opened later; must be at least 1.
    pub fn with_scratch_capacity(mut self, scratch_capacity: usize) -> Result<Self> {
        self.scratch_capacity = validate_scratch_capacity(scratch_capacity)?;
        Ok(self)
    }

    /// Opens a descriptor producing `to_charset` from `from_charset`.
    ///
    /// Append `//TRANSLIT` to `to_charset` to substitute unrepresentable
    /// characters with their closest equivalent (`€` becomes `EUR` in
    /// ASCII) instead of failing.
    pub fn open(&self, to_charset: &str, from_charset: &str) -> Result<Descriptor<IconvLibrary>> {
        let scratch_capacity = self.scratch_capacity;
        Descriptor::open(self.clone(), to_charset, from_charset)?
            .with_scratch_capacity(scratch_capacity)
    }

    /// Opens a descriptor, converts `input` and releases the descriptor.
    pub fn convert_once(&self, input: &[u8], to_charset: &str, from_charset: &str) -> Result<Vec<u8>> {
        let scratch_capacity = self.scratch_capacity;
        let engine = self.clone();
        convert_once_with(engine, input, to_charset, from_charset, scratch_capacity)
    }

    fn from_library(library: DynamicLibrary, origin: String) -> Result<Self> {
        let api = unsafe { IconvApi::load(&library)? };
        tracing::debug!(origin = %origin, "loaded iconv library");
        Ok(Self::from_inner(Arc::new(LoadedLibrary {
            _library: library,
            api,
            origin,
        })))
    }

    fn from_inner(inner: Arc<LoadedLibrary>) -> Self {
        Self {
            inner,
            scratch_capacity: crate::constants::SCRATCH_BUFFER_SIZE,
        }
    }

    /// Tells an unrepresentable character from an invalid sequence.
    ///
    /// iconv reports both as `EILSEQ`. The bytes at the failure point are run
    /// through the handle's mirror, a `UTF-8 <- from` converter in the same
    /// shift state as the main one: if they decode, the source was fine and
    /// the target cannot represent them. Without a mirror in step the answer
    /// is `InvalidSequence`.
    fn classify_illegal_sequence(&self, handle: &mut NativeHandle, rest: &[u8]) -> StepOutcome {
        let Some(mirror) = handle.mirror.filter(|_| handle.mirror_synced) else {
            return StepOutcome::InvalidSequence;
        };
        if rest.is_empty() {
            return StepOutcome::InvalidSequence;
        }

        let sample = &rest[..rest.len().min(PROBE_INPUT_LIMIT)];
        let mut scratch = [0u8; PROBE_INPUT_LIMIT * 4];
        let raw = unsafe { call_iconv(&self.inner.api, mirror, Some(sample), Some(&mut scratch[..])) };
        if raw.consumed > 0 {
            // The mirror is now ahead of the main converter.
            handle.mirror_synced = false;
        }

        if raw.consumed > 0 || raw.errno != EILSEQ {
            StepOutcome::Unrepresentable
        } else {
            StepOutcome::InvalidSequence
        }
    }

    /// Feeds the mirror the bytes the main converter just consumed.
    fn advance_mirror(&self, handle: &mut NativeHandle, consumed: &[u8]) {
        let Some(mirror) = handle.mirror.filter(|_| handle.mirror_synced) else {
            return;
        };
        if consumed.is_empty() {
            return;
        }
        let (mirrored, errno) = unsafe { discard_through(&self.inner.api, mirror, consumed) };
        if mirrored != consumed.len() {
            tracing::debug!(
                mirrored,
                consumed = consumed.len(),
                errno,
                "mirror converter fell out of step"
            );
            handle.mirror_synced = false;
        }
    }

    /// Puts the mirror back in its initial state after the main converter
    /// was rewound.
    fn rewind(&self, handle: &mut NativeHandle) {
        if let Some(mirror) = handle.mirror {
            unsafe {
                call_iconv(&self.inner.api, mirror, None, None);
            }
            handle.mirror_synced = true;
        }
    }

    fn outcome(&self, handle: &mut NativeHandle, rest: &[u8], raw: &RawCall) -> StepOutcome {
        match raw.errno {
            0 => StepOutcome::Success,
            E2BIG => StepOutcome::OutputBufferFull,
            EINVAL => StepOutcome::IncompleteSequence,
            EILSEQ => self.classify_illegal_sequence(handle, rest),
            errno => StepOutcome::EngineFailure(errno),
        }
    }
}

/// Native converter state owned by a [`Descriptor`].
pub struct NativeHandle {
    raw: IconvHandle,
    /// `UTF-8 <- from` converter fed every byte `raw` consumes.
    mirror: Option<IconvHandle>,
    mirror_synced: bool,
}

// SAFETY: iconv_t handles may move between threads; every use goes through
// `&mut NativeHandle`, so they are never touched by two threads at once.
unsafe impl Send for NativeHandle {}

impl Engine for IconvLibrary {
    type Handle = NativeHandle;

    fn open(&self, to_charset: &str, from_charset: &str) -> Result<NativeHandle> {
        let to_c = CString::new(to_charset)?;
        let from_c = CString::new(from_charset)?;
        let api = &self.inner.api;

        let raw = unsafe { (api.iconv_open)(to_c.as_ptr(), from_c.as_ptr()) };
        if raw == ICONV_INVALID_HANDLE || raw.is_null() {
            let errno = platform_errno();
            return Err(match errno {
                EINVAL => IconvError::UnsupportedCharset {
                    to: to_charset.to_string(),
                    from: from_charset.to_string(),
                },
                errno => IconvError::resource(format!(
                    "iconv_open({to_charset}, {from_charset}) failed: {}",
                    describe_errno(errno)
                )),
            });
        }

        let mirror = CString::new(PROBE_CHARSET).ok().and_then(|probe_c| {
            let mirror = unsafe { (api.iconv_open)(probe_c.as_ptr(), from_c.as_ptr()) };
            (mirror != ICONV_INVALID_HANDLE && !mirror.is_null()).then_some(mirror)
        });
        if mirror.is_none() {
            tracing::debug!(from = from_charset, "no mirror converter, EILSEQ reads as invalid input");
        }

        Ok(NativeHandle {
            raw,
            mirror,
            mirror_synced: mirror.is_some(),
        })
    }

    fn step(&self, handle: &mut NativeHandle, input: &[u8], output: &mut [u8]) -> StepReport {
        let raw = unsafe { call_iconv(&self.inner.api, handle.raw, Some(input), Some(output)) };
        let consumed = raw.consumed.min(input.len());
        self.advance_mirror(handle, &input[..consumed]);
        let outcome = self.outcome(handle, &input[consumed..], &raw);
        StepReport::new(raw.consumed, raw.produced, outcome)
    }

    fn flush(&self, handle: &mut NativeHandle, output: &mut [u8]) -> StepReport {
        let raw = unsafe { call_iconv(&self.inner.api, handle.raw, None, Some(output)) };
        let outcome = self.outcome(handle, &[], &raw);
        if outcome == StepOutcome::Success {
            self.rewind(handle);
        }
        StepReport::new(raw.consumed, raw.produced, outcome)
    }

    fn reset(&self, handle: &mut NativeHandle) {
        unsafe {
            call_iconv(&self.inner.api, handle.raw, None, None);
        }
        self.rewind(handle);
    }

    fn close(&self, handle: NativeHandle) -> Result<()> {
        let api = &self.inner.api;
        let mirror_result = handle
            .mirror
            .map_or(0, |mirror| unsafe { (api.iconv_close)(mirror) });
        let result = unsafe { (api.iconv_close)(handle.raw) };
        if result != 0 || mirror_result != 0 {
            return Err(IconvError::resource(format!(
                "iconv_close failed: {}",
                describe_errno(platform_errno())
            )));
        }
        Ok(())
    }
}

/// Converts `input` from `from_charset` to `to_charset` with the default
/// system iconv library.
///
/// The descriptor is released on every path. On a conversion failure the
/// error carries the output produced before the failure point.
///
/// ```no_run
/// let ascii = iconv_rs::convert_once("€".as_bytes(), "ASCII//TRANSLIT", "UTF-8")?;
/// assert_eq!(ascii, b"EUR");
/// # Ok::<(), iconv_rs::IconvError>(())
/// ```
pub fn convert_once(input: &[u8], to_charset: &str, from_charset: &str) -> Result<Vec<u8>> {
    IconvLibrary::load_from_env_or_default()?.convert_once(input, to_charset, from_charset)
}

#[cfg(test)]
mod runtime_tests {
    use super::IconvLibrary;
    use crate::error::IconvError;
    use crate::test_support::with_env_var;
    use crate::types::IconvConfig;

    #[test]
    fn explicit_missing_library_is_a_load_error() {
        let error = IconvLibrary::load("/nonexistent/iconv-rs/libiconv.so")
            .err()
            .expect("library must not exist");
        assert!(matches!(error, IconvError::LibraryLoad(_)));
    }

    #[test]
    fn env_library_path_takes_precedence() {
        with_env_var(
            "ICONV_LIBRARY_PATH",
            "/nonexistent/iconv-rs/from-env.so",
            || {
                let error = IconvLibrary::load_from_env_or_default()
                    .err()
                    .expect("env path must be used and fail");
                match error {
                    IconvError::LibraryLoad(message) => {
                        assert!(message.contains("from-env.so"));
                    }
                    other => panic!("unexpected error: {other}"),
                }
            },
        );
    }

    #[test]
    fn failed_env_loads_are_retried() {
        with_env_var("ICONV_LIBRARY_PATH", "/nonexistent/iconv-rs/retry.so", || {
            for _ in 0..2 {
                let error = IconvLibrary::load_from_env_or_default()
                    .err()
                    .expect("missing library");
                assert!(matches!(error, IconvError::LibraryLoad(_)));
            }
        });
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn env_library_is_loaded_once_per_path() {
        use std::sync::Arc;

        with_env_var("ICONV_LIBRARY_PATH", "libc.so.6", || {
            let first = IconvLibrary::load_from_env_or_default().expect("glibc provides iconv");
            let second = IconvLibrary::load_from_env_or_default().expect("glibc provides iconv");
            assert!(Arc::ptr_eq(&first.inner, &second.inner));
            assert_eq!(first.origin(), "libc.so.6");
        });
    }

    #[test]
    fn from_config_rejects_zero_scratch_capacity() {
        let config = IconvConfig::default()
            .with_library_path("/nonexistent/iconv-rs/unused.so")
            .with_scratch_capacity(0);
        let error = IconvLibrary::from_config(config)
            .err()
            .expect("zero capacity is invalid");
        assert!(matches!(error, IconvError::InvalidArgument(_)));
    }
}
