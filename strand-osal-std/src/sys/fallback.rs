//! Backend for targets without a dedicated native implementation.
//!
//! Only what std offers portably is available, thread ids are generated by the process.

use std::cell::LazyCell;
use std::sync::atomic::{AtomicU64, Ordering};

use strand_osal_api::thread::Priority;
use strand_osal_api::{Error, Result};

/// Global counter for generating unique thread ids.
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Thread-local storage for the current thread's id.
    static THREAD_ID: LazyCell<u64> = const { LazyCell::new(|| {
        // `Relaxed` is enough, we don't care about what specific value a thread sees.
        // We just ensure that every value is unique.
        // This assumes that creating 2^64 threads is impractical and no overflow occurs.
        NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed)
    }) };
}

pub(crate) fn thread_id() -> u64 {
    THREAD_ID.with(|thread_id| **thread_id)
}

pub(crate) fn hardware_thread() -> u32 {
    0
}

pub(crate) fn set_name(_name: &str) {
    // Names can only be applied at spawn through `std::thread::Builder`.
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
