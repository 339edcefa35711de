use std::os::raw::{c_char, c_int, c_void};

pub(crate) type IconvHandle = *mut c_void;

pub(crate) type FnIconvOpen = unsafe extern "C" fn(*const c_char, *const c_char) -> IconvHandle;
pub(crate) type FnIconv = unsafe extern "C" fn(
    IconvHandle,
    *mut *mut c_char,
    *mut usize,
    *mut *mut c_char,
    *mut usize,
) -> usize;
pub(crate) type FnIconvClose = unsafe extern "C" fn(IconvHandle) -> c_int;

/// `(iconv_t)-1`, returned by `iconv_open` on failure.
pub(crate) const ICONV_INVALID_HANDLE: IconvHandle = usize::MAX as IconvHandle;
/// `(size_t)-1`, returned by `iconv` on failure.
pub(crate) const ICONV_CALL_FAILED: usize = usize::MAX;

pub(crate) const E2BIG: c_int = 7;
pub(crate) const EINVAL: c_int = 22;
pub(crate) const ENOMEM: c_int = 12;
pub(crate) const EMFILE: c_int = 24;

#[cfg(any(target_os = "linux", target_os = "android", target_os = "openbsd"))]
pub(crate) const EILSEQ: c_int = 84;
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub(crate) const EILSEQ: c_int = 92;
#[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
pub(crate) const EILSEQ: c_int = 86;
#[cfg(target_os = "netbsd")]
pub(crate) const EILSEQ: c_int = 85;
#[cfg(target_os = "windows")]
pub(crate) const EILSEQ: c_int = 42;
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "openbsd",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "windows"
)))]
pub(crate) const EILSEQ: c_int = 84;
