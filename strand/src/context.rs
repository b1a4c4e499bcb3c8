//! Facilities for the calling thread.
//!
//! Threads started through a [`ThreadSystem`](crate::ThreadSystem) carry a back-reference to their record, which
//! makes [`self_handle`], [`should_terminate`] and the record name available without knowing the handle.
//! Every other thread can still use the native facilities, names set on such threads are kept thread-locally.

use core::cell::RefCell;
use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use strand_osal_api::thread::ThreadAbstraction;

use crate::handle::ThreadHandle;
use crate::record::{ThreadRecord, bounded_name};
use crate::{NativeThread, Result};

/// Native id of the main thread, `0` until one has been designated.
static MAIN_THREAD: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static CURRENT: RefCell<Option<Arc<ThreadRecord>>> = const { RefCell::new(None) };
    /// Name of a thread without record.
    static LOCAL_NAME: RefCell<Option<String>> = const { RefCell::new(None) };
}

pub(crate) fn enter(record: Arc<ThreadRecord>) {
    CURRENT.with_borrow_mut(|current| *current = Some(record));
}

fn with_record<R>(f: impl FnOnce(&ThreadRecord) -> R) -> Option<R> {
    CURRENT.with_borrow(|current| current.as_deref().map(f))
}

/// Returns `true` if the calling thread runs `record`.
pub(crate) fn is_current(record: &ThreadRecord) -> bool {
    with_record(|current| core::ptr::eq(current, record)).unwrap_or(false)
}

/// Returns the handle of the calling thread, [`ThreadHandle::NULL`] if it was not started through a
/// [`ThreadSystem`](crate::ThreadSystem).
pub fn self_handle() -> ThreadHandle {
    with_record(ThreadRecord::handle).unwrap_or(ThreadHandle::NULL)
}

/// Returns the name of the calling thread.
///
/// Falls back to the name std knows the thread by, e.g. `main`, and an empty string for unnamed threads.
pub fn name() -> String {
    with_record(ThreadRecord::name)
        .or_else(|| LOCAL_NAME.with_borrow(Clone::clone))
        .or_else(|| std::thread::current().name().map(bounded_name))
        .unwrap_or_default()
}

/// Renames the calling thread.
///
/// The name is bounded to [`MAX_NAME_LENGTH`](crate::MAX_NAME_LENGTH) bytes, the native name may be truncated further
/// by the operating system.
pub fn set_name(name: &str) {
    let name = bounded_name(name);
    NativeThread::set_current_name(&name);
    if with_record(|record| record.set_name(&name)).is_none() {
        LOCAL_NAME.with_borrow_mut(|local| *local = Some(name));
    }
}

/// Returns the native id of the calling thread.
pub fn id() -> u64 {
    NativeThread::current_thread_id()
}

/// Returns the hardware thread (core) the calling thread is currently scheduled on.
pub fn hardware() -> u32 {
    NativeThread::current_hardware_thread()
}

/// Restricts the calling thread to the cores in `mask`.
///
/// For threads of a [`ThreadSystem`](crate::ThreadSystem) the mask is also stored for the next start.
pub fn set_hardware(mask: u64) -> Result<()> {
    NativeThread::set_current_affinity(mask)?;
    with_record(|record| record.set_affinity(mask));
    Ok(())
}

/// Designates the calling thread as the main thread of the process.
///
/// The first designation wins.
/// Repeating it from the main thread is harmless, a designation from any other thread is reported as a failure and
/// ignored.
pub fn set_main() {
    let id = id();
    match MAIN_THREAD.compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => tracing::debug!(id, "main thread designated"),
        Err(main) if main == id => {}
        Err(main) => {
            tracing::warn!(id, main, "main thread already designated");
            crate::report_failure!(
                "!is_main_designated()",
                "main thread already designated as {main}"
            );
        }
    }
}

/// Returns `true` if the calling thread has been designated the main thread.
pub fn is_main() -> bool {
    let main = MAIN_THREAD.load(Ordering::Acquire);
    main != 0 && main == id()
}

/// Suspends the calling thread for at least `duration`.
pub fn sleep(duration: Duration) {
    NativeThread::sleep(duration);
}

/// Offers the rest of the time slice of the calling thread to other threads.
pub fn yield_now() {
    NativeThread::yield_now();
}

/// Returns `true` once termination of the calling thread has been requested.
///
/// Always `false` for threads not started through a [`ThreadSystem`](crate::ThreadSystem).
pub fn should_terminate() -> bool {
    with_record(ThreadRecord::should_terminate).unwrap_or(false)
}

/// Releases the thread-local state of the calling thread.
///
/// Called automatically when a thread of a [`ThreadSystem`](crate::ThreadSystem) leaves its entry function.
/// Threads created by other means have to call it themselves before exiting, e.g. to detach from the virtual machine.
pub fn finalize() {
    // Dropped outside the borrow, the record may own values whose destructors use this module.
    let record = CURRENT.with_borrow_mut(Option::take);
    drop(record);
    LOCAL_NAME.with_borrow_mut(|local| *local = None);
    #[cfg(any(target_os = "android", feature = "managed-runtime"))]
    strand_osal_std::vm::detach();
}
