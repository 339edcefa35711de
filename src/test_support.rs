use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::engine::{Engine, StepOutcome, StepReport};
use crate::error::{IconvError, Result};

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn set_env_var(key: &str, value: &str) {
    #[allow(unused_unsafe)]
    unsafe {
        env::set_var(key, value);
    }
}

fn remove_env_var(key: &str) {
    #[allow(unused_unsafe)]
    unsafe {
        env::remove_var(key);
    }
}

/// Runs a closure with one overridden environment variable.
pub(crate) fn with_env_var<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    with_env_vars(&[(key, Some(value))], f)
}

/// Runs a closure while holding a global environment lock and applying overrides.
pub(crate) fn with_env_vars<T>(overrides: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
    let _guard = env_lock()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let backups: Vec<(&str, Option<OsString>)> = overrides
        .iter()
        .map(|(key, _)| (*key, env::var_os(key)))
        .collect();

    for (key, value) in overrides {
        match value {
            Some(value) => set_env_var(key, value),
            None => remove_env_var(key),
        }
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    for (key, value) in backups.into_iter().rev() {
        match value {
            Some(value) => {
                #[allow(unused_unsafe)]
                unsafe {
                    env::set_var(key, value);
                }
            }
            None => remove_env_var(key),
        }
    }

    match result {
        Ok(result) => result,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

pub(crate) fn make_temp_dir(name: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic")
        .as_nanos();
    let path = env::temp_dir().join(format!("iconv-rs-{name}-{suffix}"));
    fs::create_dir_all(&path).expect("failed to create temp dir");
    path
}

pub(crate) fn remove_tree(path: &Path) {
    let _ = fs::remove_dir_all(path);
}

/// In-memory engine converting `BYTES` into lowercase `HEX`.
///
/// Byte rules: `0xff` is invalid, `0xfe` is a lead byte that needs one
/// follower (the pair becomes four hex digits), `0xfd` has no mapping unless
/// the target carries `//TRANSLIT`, where it becomes `??`. After any output
/// the converter is "shifted" and a flush writes `~`.
#[derive(Clone, Default)]
pub(crate) struct ScriptedEngine {
    counters: Arc<ScriptedCounters>,
    max_units_per_step: Option<usize>,
    fail_close: bool,
}

#[derive(Default)]
struct ScriptedCounters {
    opens: AtomicUsize,
    steps: AtomicUsize,
    closes: AtomicUsize,
}

pub(crate) struct ScriptedHandle {
    transliterate: bool,
    shifted: bool,
}

enum ScriptedUnit {
    Emit {
        bytes: Vec<u8>,
        width: usize,
    },
    Fail(StepOutcome),
}

fn scripted_unit(input: &[u8], transliterate: bool) -> ScriptedUnit {
    let hex = |bytes: &[u8]| -> Vec<u8> {
        bytes
            .iter()
            .flat_map(|byte| format!("{byte:02x}").into_bytes())
            .collect()
    };
    match input[0] {
        0xff => ScriptedUnit::Fail(StepOutcome::InvalidSequence),
        0xfe if input.len() < 2 => ScriptedUnit::Fail(StepOutcome::IncompleteSequence),
        0xfe => ScriptedUnit::Emit {
            bytes: hex(&input[..2]),
            width: 2,
        },
        0xfd if transliterate => ScriptedUnit::Emit {
            bytes: b"??".to_vec(),
            width: 1,
        },
        0xfd => ScriptedUnit::Fail(StepOutcome::Unrepresentable),
        _ => ScriptedUnit::Emit {
            bytes: hex(&input[..1]),
            width: 1,
        },
    }
}

/// Converts `input` in one pass with unbounded output.
///
/// On failure returns the failing input offset.
pub(crate) fn scripted_reference(
    input: &[u8],
    transliterate: bool,
) -> std::result::Result<Vec<u8>, usize> {
    let mut output = Vec::new();
    let mut position = 0;
    while position < input.len() {
        match scripted_unit(&input[position..], transliterate) {
            ScriptedUnit::Emit { bytes, width, .. } => {
                output.extend_from_slice(&bytes);
                position += width;
            }
            ScriptedUnit::Fail(_) => return Err(position),
        }
    }
    Ok(output)
}

impl ScriptedEngine {
    /// Limits how many input units one step converts before returning.
    pub(crate) fn with_max_units_per_step(mut self, max_units: usize) -> Self {
        self.max_units_per_step = Some(max_units);
        self
    }

    /// Makes every `close` report a release failure.
    pub(crate) fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub(crate) fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn steps(&self) -> usize {
        self.counters.steps.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

impl Engine for ScriptedEngine {
    type Handle = ScriptedHandle;

    fn open(&self, to_charset: &str, from_charset: &str) -> Result<ScriptedHandle> {
        let transliterate = match (to_charset, from_charset) {
            ("HEX", "BYTES") => false,
            ("HEX//TRANSLIT", "BYTES") => true,
            _ => {
                return Err(IconvError::UnsupportedCharset {
                    to: to_charset.to_string(),
                    from: from_charset.to_string(),
                })
            }
        };
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedHandle {
            transliterate,
            shifted: false,
        })
    }

    fn step(&self, handle: &mut ScriptedHandle, input: &[u8], output: &mut [u8]) -> StepReport {
        self.counters.steps.fetch_add(1, Ordering::SeqCst);

        let mut consumed = 0;
        let mut produced = 0;
        let mut units = 0;
        while consumed < input.len() {
            if self.max_units_per_step.is_some_and(|max| units >= max) {
                break;
            }
            match scripted_unit(&input[consumed..], handle.transliterate) {
                ScriptedUnit::Emit { bytes, width } => {
                    if output.len() - produced < bytes.len() {
                        return StepReport::new(consumed, produced, StepOutcome::OutputBufferFull);
                    }
                    output[produced..produced + bytes.len()].copy_from_slice(&bytes);
                    produced += bytes.len();
                    consumed += width;
                    units += 1;
                    handle.shifted = true;
                }
                ScriptedUnit::Fail(outcome) => {
                    return StepReport::new(consumed, produced, outcome);
                }
            }
        }
        StepReport::new(consumed, produced, StepOutcome::Success)
    }

    fn flush(&self, handle: &mut ScriptedHandle, output: &mut [u8]) -> StepReport {
        if !handle.shifted {
            return StepReport::new(0, 0, StepOutcome::Success);
        }
        if output.is_empty() {
            return StepReport::new(0, 0, StepOutcome::OutputBufferFull);
        }
        output[0] = b'~';
        handle.shifted = false;
        StepReport::new(0, 1, StepOutcome::Success)
    }

    fn reset(&self, handle: &mut ScriptedHandle) {
        handle.shifted = false;
    }

    fn close(&self, _handle: ScriptedHandle) -> Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(IconvError::resource("scripted close failure"));
        }
        Ok(())
    }
}
