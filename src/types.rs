use std::env;
use std::path::{Path, PathBuf};

use crate::constants::{ICONV_LIBRARY_PATH_ENV, SCRATCH_BUFFER_SIZE};
use crate::error::{IconvError, Result};

/// Settings used to load the native library and size conversion buffers.
#[derive(Debug, Clone)]
pub struct IconvConfig {
    /// Explicit dynamic library path. `None` means discover one.
    pub library_path: Option<PathBuf>,
    /// Scratch buffer capacity handed to descriptors opened by the library.
    pub scratch_capacity: usize,
}

impl Default for IconvConfig {
    fn default() -> Self {
        Self {
            library_path: env::var_os(ICONV_LIBRARY_PATH_ENV).map(PathBuf::from),
            scratch_capacity: SCRATCH_BUFFER_SIZE,
        }
    }
}

impl IconvConfig {
    /// Uses the library at `library_path` instead of discovering one.
    pub fn with_library_path(mut self, library_path: impl AsRef<Path>) -> Self {
        self.library_path = Some(library_path.as_ref().to_path_buf());
        self
    }

    /// Sets the scratch buffer capacity; must be at least 1.
    pub fn with_scratch_capacity(mut self, scratch_capacity: usize) -> Self {
        self.scratch_capacity = scratch_capacity;
        self
    }

    pub(crate) fn validated_scratch_capacity(&self) -> Result<usize> {
        validate_scratch_capacity(self.scratch_capacity)
    }
}

pub(crate) fn validate_scratch_capacity(scratch_capacity: usize) -> Result<usize> {
    if scratch_capacity == 0 {
        return Err(IconvError::InvalidArgument(
            "scratch_capacity must be >= 1".to_string(),
        ));
    }
    Ok(scratch_capacity)
}

/// Result of a successful conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversion {
    /// Converted bytes.
    pub output: Vec<u8>,
    /// Number of engine steps the run took.
    pub steps: usize,
}
