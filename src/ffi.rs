//! C ABI for instrumented programs.
//!
//! The compiler passes insert calls to these symbols at program start, at
//! every instrumented call site and before exit. They forward to
//! [`crate::global`] and return `1` on success, `0` on failure. Panics are
//! caught here and never unwind into the host.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_long};
use std::os::unix::ffi::OsStrExt;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use crate::diagnostics;
use crate::global;
use crate::paths::{PathResolver, PATH_MAX_LEN};

fn status(f: impl FnOnce() -> bool) -> c_int {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(true) => 1,
        _ => 0,
    }
}

/// Initializes logging.
///
/// `max_records` is the buffer capacity; `output_mode` is `0` for file
/// output and `1` for pipe output. Pipe mode blocks until a reader opens
/// `~/.clam-prov/audit.pipe`.
#[no_mangle]
pub extern "C" fn clam_prov_logging_init(max_records: c_int, output_mode: c_int) -> c_int {
    status(|| {
        diagnostics::init_from_env();
        global::init(max_records, output_mode)
    })
}

/// Buffers one call-site record, flushing when the buffer is full.
///
/// # Safety
///
/// `function_name` must be NULL or point to a NUL-terminated string that
/// stays valid for the duration of the call. NULL is reported as failure.
#[no_mangle]
pub unsafe extern "C" fn clam_prov_logging_buffer(
    call_site_id: c_long,
    exit_value: c_long,
    function_name: *const c_char,
) -> c_int {
    if function_name.is_null() {
        return 0;
    }
    // SAFETY: non-null and NUL-terminated per the contract above.
    let name = unsafe { CStr::from_ptr(function_name) };
    status(|| global::buffer(i64::from(call_site_id), i64::from(exit_value), name.to_bytes()))
}

/// Flushes if the buffer is full, or unconditionally when `force` is non-zero.
#[no_mangle]
pub extern "C" fn clam_prov_logging_check_and_flush(force: c_int) -> c_int {
    status(|| global::check_and_flush(force != 0))
}

/// Flushes the remaining records and releases all resources.
#[no_mangle]
pub extern "C" fn clam_prov_logging_shutdown() -> c_int {
    status(global::shutdown)
}

/// Copies the absolute path of `~/.clam-prov/audit.log` into `dst`.
///
/// With a non-zero `create`, the `.clam-prov` directory is created if
/// missing. Returns `dst` on success and NULL otherwise.
///
/// # Safety
///
/// `dst` must be NULL or valid for writes of `PATH_MAX_LEN` (4096) bytes.
#[no_mangle]
pub unsafe extern "C" fn clam_prov_logger_get_home_file(dst: *mut c_char, create: c_int) -> *mut c_char {
    // SAFETY: forwarded contract.
    unsafe { copy_home_path(dst, create != 0, |r, c| r.audit_log_path(c)) }
}

/// Copies the absolute path of `~/.clam-prov/audit.pipe` into `dst`.
///
/// # Safety
///
/// Same contract as [`clam_prov_logger_get_home_file`].
#[no_mangle]
pub unsafe extern "C" fn clam_prov_logger_get_home_pipe(dst: *mut c_char, create: c_int) -> *mut c_char {
    // SAFETY: forwarded contract.
    unsafe { copy_home_path(dst, create != 0, |r, c| r.audit_pipe_path(c)) }
}

unsafe fn copy_home_path(
    dst: *mut c_char,
    create: bool,
    resolve: impl FnOnce(&PathResolver, bool) -> crate::ProvResult<std::path::PathBuf>,
) -> *mut c_char {
    if dst.is_null() {
        return ptr::null_mut();
    }
    let resolved = panic::catch_unwind(AssertUnwindSafe(|| {
        PathResolver::for_current_user().and_then(|resolver| resolve(&resolver, create))
    }));
    let path = match resolved {
        Ok(Ok(path)) => path,
        _ => return ptr::null_mut(),
    };
    let bytes = path.as_os_str().as_bytes();
    // Resolution already guarantees len < PATH_MAX_LEN, leaving room for NUL.
    if bytes.len() >= PATH_MAX_LEN {
        return ptr::null_mut();
    }
    // SAFETY: dst is valid for PATH_MAX_LEN bytes per the caller contract.
    unsafe {
        ptr::write_bytes(dst, 0, PATH_MAX_LEN);
        ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), dst, bytes.len());
    }
    dst
}
