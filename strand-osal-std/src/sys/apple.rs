//! macOS and iOS backend.
//!
//! Darwin has no core affinity masks or per-thread nice values, those requests are reported as unsupported.

use std::ffi::CString;

use strand_osal_api::thread::Priority;
use strand_osal_api::{Error, Result};

/// Longest thread name Darwin stores, excluding the terminating NUL.
const MAX_NATIVE_NAME_LENGTH: usize = 63;

pub(crate) fn thread_id() -> u64 {
    let mut id = 0u64;
    // SAFETY: `pthread_self` is always a valid thread and `id` is a valid out pointer.
    let result = unsafe { libc::pthread_threadid_np(libc::pthread_self(), &mut id) };
    debug_assert_eq!(result, 0, "pthread_threadid_np failed for the calling thread");
    id
}

pub(crate) fn hardware_thread() -> u32 {
    0
}

pub(crate) fn set_name(name: &str) {
    let mut end = name.len().min(MAX_NATIVE_NAME_LENGTH);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let Ok(name) = CString::new(&name[..end]) else {
        return;
    };
    // SAFETY: `name` is NUL terminated and short enough for the native buffer.
    let result = unsafe { libc::pthread_setname_np(name.as_ptr()) };
    if result != 0 {
        tracing::debug!(
            error = %std::io::Error::from_raw_os_error(result),
            "failed to set native thread name"
        );
    }
}

pub(crate) fn available_cores() -> u64 {
    super::mask_for_core_count(std::thread::available_parallelism().map_or(1, usize::from))
}

pub(crate) fn set_affinity(_mask: u64) -> Result<()> {
    Err(Error::Unsupported)
}

pub(crate) fn set_priority(_priority: Priority) -> Result<()> {
    Err(Error::Unsupported)
}
