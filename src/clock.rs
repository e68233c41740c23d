//! Time and thread identity sampled for every buffered record.
//!
//! Records carry wall-clock milliseconds so offline readers can line them up
//! with other system logs, and the OS thread id of the producer so records
//! from different threads can be told apart.

use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

thread_local! {
    /// Thread id of the current thread, looked up on first use.
    static CACHED_THREAD_ID: Cell<Option<i32>> = const { Cell::new(None) };
}

/// Returns the wall-clock time in milliseconds since the Unix epoch.
///
/// A clock set before 1970 reads as 0 rather than failing.
#[inline]
pub fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns the OS thread id of the calling thread.
///
/// The id is queried from the kernel once per thread and cached in a
/// thread-local, so every later call is a plain load.
#[inline]
pub fn current_thread_id() -> i32 {
    CACHED_THREAD_ID.with(|cached| match cached.get() {
        Some(tid) => tid,
        None => {
            let tid = os_thread_id();
            cached.set(Some(tid));
            tid
        }
    })
}

/// Queries the kernel for the calling thread's id.
///
/// - Linux/Android: `gettid(2)`
/// - macOS/iOS: `pthread_threadid_np`, narrowed to 32 bits
/// - Other platforms: the process id
pub fn os_thread_id() -> i32 {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        // SAFETY: gettid takes no arguments and cannot fail.
        unsafe { libc::syscall(libc::SYS_gettid) as i32 }
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        let mut tid: u64 = 0;
        // SAFETY: a zero thread handle means the calling thread; `tid` is a
        // valid out-pointer for the duration of the call.
        unsafe {
            libc::pthread_threadid_np(0, &mut tid);
        }
        tid as i32
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "ios"
    )))]
    {
        std::process::id() as i32
    }
}
