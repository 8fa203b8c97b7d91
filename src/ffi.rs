//! FFI bindings for Gazemetry
//!
//! C-compatible functions for calling Gazemetry from a presentation layer
//! written in another language. All functions take null-terminated C strings
//! and return allocated memory that must be freed with `gaze_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::GazeConfig;
use crate::error::ComputeError;
use crate::pipeline::{samples_to_calibration, samples_to_report, GazeProcessor};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Turn a pipeline result into an owned C string, recording any error
fn finish_string(result: Result<String, ComputeError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Fit a calibration from a sample payload (JSON array or NDJSON).
///
/// # Safety
/// - `samples_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `gaze_free_string`.
/// - Returns NULL on error; call `gaze_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gaze_samples_to_calibration(samples_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let Some(samples) = cstr_to_string(samples_json) else {
        set_last_error("Invalid samples string pointer");
        return ptr::null_mut();
    };

    finish_string(samples_to_calibration(samples))
}

/// Analyze a session payload and return the encoded report.
///
/// # Safety
/// - `samples_json` must be a valid null-terminated C string.
/// - `mapping_json` is a calibration record or NULL for an uncalibrated session.
/// - Returns a newly allocated string that must be freed with `gaze_free_string`.
/// - Returns NULL on error; call `gaze_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gaze_samples_to_report(
    samples_json: *const c_char,
    mapping_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(samples) = cstr_to_string(samples_json) else {
        set_last_error("Invalid samples string pointer");
        return ptr::null_mut();
    };
    let mapping = if mapping_json.is_null() {
        None
    } else {
        match cstr_to_string(mapping_json) {
            Some(s) => Some(s),
            None => {
                set_last_error("Invalid mapping string pointer");
                return ptr::null_mut();
            }
        }
    };

    finish_string(samples_to_report(samples, mapping))
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a GazeProcessor
pub struct GazeProcessorHandle {
    processor: GazeProcessor,
}

/// Create a processor.
///
/// # Safety
/// - `config_json` is a `GazeConfig` document or NULL for the defaults.
/// - Must be freed with `gaze_processor_free`.
/// - Returns NULL on error; call `gaze_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gaze_processor_new(config_json: *const c_char) -> *mut GazeProcessorHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        Ok(GazeConfig::default())
    } else {
        match cstr_to_string(config_json) {
            Some(json) => GazeConfig::from_json(&json),
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        }
    };

    match config.and_then(GazeProcessor::with_config) {
        Ok(processor) => Box::into_raw(Box::new(GazeProcessorHandle { processor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `gaze_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn gaze_processor_free(processor: *mut GazeProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Calibrate the processor from a sample payload; returns the record JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `gaze_processor_new`.
/// - `samples_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `gaze_free_string`.
/// - Returns NULL on error; call `gaze_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gaze_processor_calibrate(
    processor: *mut GazeProcessorHandle,
    samples_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &mut *processor;

    let Some(samples) = cstr_to_string(samples_json) else {
        set_last_error("Invalid samples string pointer");
        return ptr::null_mut();
    };

    finish_string(handle.processor.calibrate(&samples))
}

/// Analyze a session payload with the processor's calibration.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `gaze_processor_new`.
/// - `samples_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `gaze_free_string`.
/// - Returns NULL on error; call `gaze_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gaze_processor_process(
    processor: *mut GazeProcessorHandle,
    samples_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &*processor;

    let Some(samples) = cstr_to_string(samples_json) else {
        set_last_error("Invalid samples string pointer");
        return ptr::null_mut();
    };

    finish_string(handle.processor.process(&samples))
}

/// Save the processor's calibration record to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `gaze_processor_new`.
/// - Returns a newly allocated string that must be freed with `gaze_free_string`.
/// - Returns NULL on error; call `gaze_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gaze_processor_save_calibration(
    processor: *mut GazeProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }
    let handle = &*processor;

    finish_string(handle.processor.save_calibration())
}

/// Load a calibration record into the processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `gaze_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `gaze_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gaze_processor_load_calibration(
    processor: *mut GazeProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }
    let handle = &mut *processor;

    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return -1;
    };

    match handle.processor.load_calibration(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Gazemetry functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Gazemetry function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn gaze_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Gazemetry call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn gaze_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn gaze_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::standard_targets;
    use crate::config::ScreenGeometry;
    use crate::schema::RawSample;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn calibration_ndjson() -> CString {
        let mut lines = Vec::new();
        let mut ms = 0;
        for target in standard_targets(&ScreenGeometry::default(), 150) {
            let h = 0.30 + 0.40 * target.screen_x / 1920.0;
            let v = 0.35 + 0.30 * target.screen_y / 1080.0;
            for _ in 0..10 {
                let sample = RawSample::with_ratios(t(ms), h, v);
                lines.push(serde_json::to_string(&sample).unwrap());
                ms += 33;
            }
        }
        CString::new(lines.join("\n")).unwrap()
    }

    fn session_ndjson() -> CString {
        let lines: Vec<String> = (0..60)
            .map(|i| {
                let sample = RawSample::with_ratios(t(10_000 + i * 33), 0.5, 0.5);
                serde_json::to_string(&sample).unwrap()
            })
            .collect();
        CString::new(lines.join("\n")).unwrap()
    }

    #[test]
    fn test_ffi_stateless_calibrate_and_report() {
        let samples = calibration_ndjson();
        unsafe {
            let mapping = gaze_samples_to_calibration(samples.as_ptr());
            assert!(!mapping.is_null());

            let session = session_ndjson();
            let report = gaze_samples_to_report(session.as_ptr(), mapping);
            assert!(!report.is_null());

            let report_str = CStr::from_ptr(report).to_str().unwrap();
            assert!(report_str.contains("gaze.report.v1"));

            gaze_free_string(report);
            gaze_free_string(mapping);
        }
    }

    #[test]
    fn test_ffi_report_without_mapping() {
        let session = session_ndjson();
        unsafe {
            let report = gaze_samples_to_report(session.as_ptr(), ptr::null());
            assert!(!report.is_null());
            let report_str = CStr::from_ptr(report).to_str().unwrap();
            assert!(report_str.contains("no_mapping"));
            gaze_free_string(report);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let processor = gaze_processor_new(ptr::null());
            assert!(!processor.is_null());

            let samples = calibration_ndjson();
            let record = gaze_processor_calibrate(processor, samples.as_ptr());
            assert!(!record.is_null());

            let saved = gaze_processor_save_calibration(processor);
            assert!(!saved.is_null());

            let other = gaze_processor_new(ptr::null());
            assert_eq!(gaze_processor_load_calibration(other, saved), 0);

            let session = session_ndjson();
            let report = gaze_processor_process(other, session.as_ptr());
            assert!(!report.is_null());

            gaze_free_string(report);
            gaze_free_string(saved);
            gaze_free_string(record);
            gaze_processor_free(other);
            gaze_processor_free(processor);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let bad = CString::new("not json").unwrap();
        unsafe {
            let result = gaze_samples_to_calibration(bad.as_ptr());
            assert!(result.is_null());

            let error = gaze_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("parse"));
        }
    }

    #[test]
    fn test_ffi_null_processor() {
        let samples = calibration_ndjson();
        unsafe {
            assert!(gaze_processor_calibrate(ptr::null_mut(), samples.as_ptr()).is_null());
            assert_eq!(
                gaze_processor_load_calibration(ptr::null_mut(), samples.as_ptr()),
                -1
            );
        }
    }

    #[test]
    fn test_ffi_bad_config_rejected() {
        let config = CString::new(r#"{ "smoothing": { "window": "wide" } }"#).unwrap();
        unsafe {
            assert!(gaze_processor_new(config.as_ptr()).is_null());
            assert!(!gaze_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = gaze_version();
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}
