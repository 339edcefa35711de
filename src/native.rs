use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::path::Path;
use std::ptr;

use crate::config::{
    FnIconv, FnIconvClose, FnIconvOpen, IconvHandle, E2BIG, EMFILE, ENOMEM, ICONV_CALL_FAILED,
};
use crate::error::{IconvError, Result};

#[derive(Clone, Copy)]
pub(crate) struct IconvApi {
    pub(crate) iconv_open: FnIconvOpen,
    pub(crate) iconv: FnIconv,
    pub(crate) iconv_close: FnIconvClose,
}

impl IconvApi {
    /// Resolves the three iconv entry points.
    ///
    /// GNU libiconv exports `libiconv_open`/`libiconv`/`libiconv_close` and
    /// only macro-aliases the plain names, so both spellings are tried.
    pub(crate) unsafe fn load(library: &DynamicLibrary) -> Result<Self> {
        Ok(Self {
            iconv_open: library.load_symbol_any(&["iconv_open", "libiconv_open"])?,
            iconv: library.load_symbol_any(&["iconv", "libiconv"])?,
            iconv_close: library.load_symbol_any(&["iconv_close", "libiconv_close"])?,
        })
    }
}

pub(crate) struct LoadedLibrary {
    pub(crate) _library: DynamicLibrary,
    pub(crate) api: IconvApi,
    pub(crate) origin: String,
}

#[derive(Debug)]
pub(crate) struct DynamicLibrary {
    handle: *mut c_void,
}

// SAFETY: the handle is only passed to the platform loader, which is
// thread-safe for lookups and the final close happens in `Drop`.
unsafe impl Send for DynamicLibrary {}
unsafe impl Sync for DynamicLibrary {}

impl DynamicLibrary {
    pub(crate) fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_string = path.as_ref().to_string_lossy().to_string();
        let path_c = CString::new(path_string.clone())?;
        let handle = unsafe { platform_open(path_c.as_ptr()) };
        if handle.is_null() {
            return Err(IconvError::LibraryLoad(format!(
                "{} ({})",
                path_string,
                platform_last_error()
            )));
        }
        Ok(Self { handle })
    }

    pub(crate) unsafe fn load_symbol_optional<T: Copy>(
        &self,
        symbol_name: &str,
    ) -> Result<Option<T>> {
        let symbol_c = CString::new(symbol_name)?;
        let symbol_ptr = platform_symbol(self.handle, symbol_c.as_ptr());
        if symbol_ptr.is_null() {
            return Ok(None);
        }
        Ok(Some(std::mem::transmute_copy::<*mut c_void, T>(
            &symbol_ptr,
        )))
    }

    /// Returns the first of `symbol_names` the library exports.
    pub(crate) unsafe fn load_symbol_any<T: Copy>(&self, symbol_names: &[&str]) -> Result<T> {
        for symbol_name in symbol_names {
            if let Some(symbol) = self.load_symbol_optional(symbol_name)? {
                return Ok(symbol);
            }
        }
        Err(IconvError::SymbolLoad(format!(
            "{} ({})",
            symbol_names.join(" | "),
            platform_last_error()
        )))
    }
}

impl Drop for DynamicLibrary {
    fn drop(&mut self) {
        if self.handle.is_null() {
            return;
        }
        unsafe {
            platform_close(self.handle);
        }
        self.handle = ptr::null_mut();
    }
}

/// Outcome of one raw `iconv(3)` call, with `errno` captured immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawCall {
    pub(crate) consumed: usize,
    pub(crate) produced: usize,
    /// `errno` of a failed call, 0 on success.
    pub(crate) errno: c_int,
}

/// Runs `iconv` over `input` into `output`.
///
/// `input == None` is the flush form that writes the shift-reset sequence.
/// `output == None` together with `input == None` resets the state.
pub(crate) unsafe fn call_iconv(
    api: &IconvApi,
    handle: IconvHandle,
    input: Option<&[u8]>,
    output: Option<&mut [u8]>,
) -> RawCall {
    let input_len = input.map_or(0, <[u8]>::len);
    let mut in_ptr = input.map_or(ptr::null_mut(), |bytes| bytes.as_ptr() as *mut c_char);
    let mut in_left = input_len;

    let output_len = output.as_ref().map_or(0, |bytes| bytes.len());
    let mut out_ptr = match output {
        Some(bytes) => bytes.as_mut_ptr() as *mut c_char,
        None => ptr::null_mut(),
    };
    let mut out_left = output_len;

    let in_ptr_arg: *mut *mut c_char = if input.is_some() {
        &mut in_ptr
    } else {
        ptr::null_mut()
    };
    let in_left_arg: *mut usize = if input.is_some() {
        &mut in_left
    } else {
        ptr::null_mut()
    };
    let (out_ptr_arg, out_left_arg): (*mut *mut c_char, *mut usize) = if out_ptr.is_null() {
        (ptr::null_mut(), ptr::null_mut())
    } else {
        (&mut out_ptr, &mut out_left)
    };

    let result = (api.iconv)(handle, in_ptr_arg, in_left_arg, out_ptr_arg, out_left_arg);
    let errno = if result == ICONV_CALL_FAILED {
        platform_errno()
    } else {
        0
    };

    RawCall {
        consumed: input_len - in_left,
        produced: output_len - out_left,
        errno,
    }
}

/// Runs all of `input` through `handle` and throws the output away.
///
/// Returns the number of bytes consumed and the `errno` of the last call.
/// The run stopped early when fewer than `input.len()` bytes were consumed.
pub(crate) unsafe fn discard_through(
    api: &IconvApi,
    handle: IconvHandle,
    input: &[u8],
) -> (usize, c_int) {
    let mut sink = [0u8; 256];
    let mut consumed = 0;
    while consumed < input.len() {
        let raw = call_iconv(api, handle, Some(&input[consumed..]), Some(&mut sink[..]));
        consumed += raw.consumed;
        let progressed = raw.consumed > 0 || raw.produced > 0;
        if !progressed || (raw.errno != 0 && raw.errno != E2BIG) {
            return (consumed, raw.errno);
        }
    }
    (consumed, 0)
}

pub(crate) fn describe_errno(errno: c_int) -> String {
    match errno {
        ENOMEM => "out of memory".to_string(),
        EMFILE => "too many open descriptors".to_string(),
        other => format!("errno {other}"),
    }
}

#[cfg(unix)]
pub(crate) fn platform_errno() -> c_int {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[cfg(target_os = "windows")]
extern "C" {
    fn _errno() -> *mut c_int;
}

#[cfg(target_os = "windows")]
pub(crate) fn platform_errno() -> c_int {
    unsafe { *_errno() }
}

#[cfg(target_os = "windows")]
#[link(name = "kernel32")]
extern "system" {
    fn LoadLibraryA(lp_lib_file_name: *const c_char) -> *mut c_void;
    fn GetProcAddress(h_module: *mut c_void, lp_proc_name: *const c_char) -> *mut c_void;
    fn FreeLibrary(h_lib_module: *mut c_void) -> i32;
    fn GetLastError() -> u32;
}

#[cfg(target_os = "windows")]
unsafe fn platform_open(path: *const c_char) -> *mut c_void {
    LoadLibraryA(path)
}

#[cfg(target_os = "windows")]
unsafe fn platform_symbol(handle: *mut c_void, symbol: *const c_char) -> *mut c_void {
    GetProcAddress(handle, symbol)
}

#[cfg(target_os = "windows")]
unsafe fn platform_close(handle: *mut c_void) {
    let _ = FreeLibrary(handle);
}

#[cfg(target_os = "windows")]
fn platform_last_error() -> String {
    format!("GetLastError={}", unsafe { GetLastError() })
}

#[cfg(target_os = "linux")]
#[link(name = "dl")]
extern "C" {
    fn dlopen(filename: *const c_char, flags: c_int) -> *mut c_void;
    fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void;
    fn dlclose(handle: *mut c_void) -> c_int;
    fn dlerror() -> *const c_char;
}

#[cfg(all(unix, not(target_os = "linux")))]
extern "C" {
    fn dlopen(filename: *const c_char, flags: c_int) -> *mut c_void;
    fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void;
    fn dlclose(handle: *mut c_void) -> c_int;
    fn dlerror() -> *const c_char;
}

#[cfg(unix)]
unsafe fn platform_open(path: *const c_char) -> *mut c_void {
    const RTLD_NOW: c_int = 2;
    const RTLD_LOCAL: c_int = 0;
    dlopen(path, RTLD_NOW | RTLD_LOCAL)
}

#[cfg(unix)]
unsafe fn platform_symbol(handle: *mut c_void, symbol: *const c_char) -> *mut c_void {
    dlsym(handle, symbol)
}

#[cfg(unix)]
unsafe fn platform_close(handle: *mut c_void) {
    let _ = dlclose(handle);
}

#[cfg(unix)]
fn platform_last_error() -> String {
    let pointer = unsafe { dlerror() };
    if pointer.is_null() {
        "unknown error".to_string()
    } else {
        let full = unsafe { CStr::from_ptr(pointer) }
            .to_string_lossy()
            .to_string();
        full.split(": tried:").next().unwrap_or(&full).to_string()
    }
}
