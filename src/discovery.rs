use std::env;
use std::path::PathBuf;

/// Library names handed straight to the platform loader, in preference order.
pub(crate) fn default_library_candidates() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["iconv.dll", "libiconv.dll", "libiconv-2.dll"]
    }
    #[cfg(target_os = "macos")]
    {
        &[
            "/usr/lib/libiconv.2.dylib",
            "libiconv.2.dylib",
            "libiconv.dylib",
            "/opt/homebrew/opt/libiconv/lib/libiconv.dylib",
            "/usr/local/opt/libiconv/lib/libiconv.dylib",
        ]
    }
    #[cfg(all(unix, not(target_os = "macos")))]
    {
        // glibc and musl carry iconv inside libc itself.
        &[
            "libc.so.6",
            "libiconv.so.2",
            "libiconv.so",
            "libc.so",
            "/usr/local/lib/libiconv.so",
        ]
    }
}

/// Looks for a user-installed iconv library in well-known locations.
pub(crate) fn discover_default_library_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        if let Some(local_app_data) = env::var_os("LOCALAPPDATA") {
            let path = PathBuf::from(local_app_data)
                .join("iconv")
                .join("bin")
                .join("iconv.dll");
            if path.exists() {
                return Some(path);
            }
        }
        let well_known = [
            PathBuf::from("C:\\iconv\\bin\\iconv.dll"),
            PathBuf::from("C:\\Program Files\\GnuWin32\\bin\\libiconv2.dll"),
        ];
        for path in well_known {
            if path.exists() {
                return Some(path);
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = env::var_os("HOME") {
            let path = PathBuf::from(home)
                .join(".local")
                .join("lib")
                .join("libiconv.dylib");
            if path.exists() {
                return Some(path);
            }
        }
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        if let Some(home) = env::var_os("HOME") {
            let path = PathBuf::from(home)
                .join(".local")
                .join("lib")
                .join("libiconv.so");
            if path.exists() {
                return Some(path);
            }
        }

        let well_known = [
            PathBuf::from("/usr/local/lib/libiconv.so.2"),
            PathBuf::from("/usr/local/lib/libiconv.so"),
        ];
        for path in well_known {
            if path.exists() {
                return Some(path);
            }
        }
    }

    None
}
