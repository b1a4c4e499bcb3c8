//! Per-thread state shared between a [`ThreadSystem`](crate::ThreadSystem) and the native thread.

use core::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use strand_osal_api::thread::{Priority, ThreadAbstraction};

use crate::context;
use crate::handle::ThreadHandle;
use crate::payload::Payload;

/// Maximum length of a thread name in bytes.
pub const MAX_NAME_LENGTH: usize = 32;

/// Function run on a thread, receives the argument passed to [`start`](crate::ThreadSystem::start) and returns the
/// thread result.
pub(crate) type EntryFn = Arc<dyn Fn(Option<Payload>) -> Option<Payload> + Send + Sync>;

/// Lifecycle state of a live thread.
///
/// Destroyed threads have no state, their handles are invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ThreadState {
    /// Created but never started.
    Created = 0,
    /// Claimed by a start, the native thread has not entered yet.
    Started = 1,
    /// The entry function is executing.
    Running = 2,
    /// The entry function returned, the thread may be started again.
    Stopped = 3,
}

impl ThreadState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Started,
            2 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// Removes NUL bytes and truncates `name` to [`MAX_NAME_LENGTH`] bytes without splitting a character.
pub(crate) fn bounded_name(name: &str) -> String {
    let mut bounded = String::with_capacity(name.len().min(MAX_NAME_LENGTH));
    for character in name.chars().filter(|&character| character != '\0') {
        if bounded.len() + character.len_utf8() > MAX_NAME_LENGTH {
            break;
        }
        bounded.push(character);
    }
    bounded
}

pub(crate) struct ThreadRecord {
    handle: ThreadHandle,
    entry: EntryFn,
    name: Mutex<String>,
    priority: Priority,
    stack_size: usize,
    affinity: AtomicU64,
    state: AtomicU8,
    started: AtomicBool,
    terminate: AtomicBool,
    result: Mutex<Option<Payload>>,
    native_id: AtomicU64,
}

impl fmt::Debug for ThreadRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadRecord")
            .field("handle", &self.handle)
            .field("name", &self.name())
            .field("state", &self.state())
            .field("terminate", &self.should_terminate())
            .finish_non_exhaustive()
    }
}

impl ThreadRecord {
    pub(crate) fn new(
        handle: ThreadHandle,
        entry: EntryFn,
        name: &str,
        priority: Priority,
        stack_size: usize,
    ) -> Self {
        Self {
            handle,
            entry,
            name: Mutex::new(bounded_name(name)),
            priority,
            stack_size,
            affinity: AtomicU64::new(0),
            state: AtomicU8::new(ThreadState::Created as u8),
            started: AtomicBool::new(false),
            terminate: AtomicBool::new(false),
            result: Mutex::new(None),
            native_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn handle(&self) -> ThreadHandle {
        self.handle
    }

    pub(crate) fn name(&self) -> String {
        self.name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.name.lock().unwrap_or_else(PoisonError::into_inner) = bounded_name(name);
    }

    pub(crate) fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn stack_size(&self) -> usize {
        self.stack_size
    }

    pub(crate) fn affinity(&self) -> u64 {
        self.affinity.load(Ordering::Acquire)
    }

    pub(crate) fn set_affinity(&self, mask: u64) {
        self.affinity.store(mask, Ordering::Release);
    }

    pub(crate) fn native_id(&self) -> u64 {
        self.native_id.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `true` once the record has been started successfully, never reset.
    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state() == ThreadState::Running
    }

    pub(crate) fn should_terminate(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    pub(crate) fn request_terminate(&self) {
        self.terminate.store(true, Ordering::Release);
    }

    pub(crate) fn result(&self) -> Option<Payload> {
        self.result
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Moves the record from `Created` or `Stopped` to `Started`.
    ///
    /// Returns the previous state, or the current state if the record can not be started.
    pub(crate) fn claim_start(&self) -> Result<ThreadState, ThreadState> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let state = ThreadState::from_u8(current);
            if !matches!(state, ThreadState::Created | ThreadState::Stopped) {
                return Err(state);
            }
            match self.state.compare_exchange_weak(
                current,
                ThreadState::Started as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(state),
                Err(actual) => current = actual,
            }
        }
    }

    /// Undoes a [`claim_start`](Self::claim_start) after the native thread could not be spawned.
    pub(crate) fn restore(&self, previous: ThreadState) {
        self.state.store(previous as u8, Ordering::Release);
    }

    pub(crate) fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    /// Undoes [`mark_started`](Self::mark_started) after a first start failed to spawn.
    pub(crate) fn clear_started(&self) {
        self.started.store(false, Ordering::Release);
    }

    /// Body of the native thread.
    pub(crate) fn run<P: ThreadAbstraction>(self: Arc<Self>, argument: Option<Payload>) {
        self.native_id.store(P::current_thread_id(), Ordering::Release);
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = None;
        context::enter(Arc::clone(&self));
        self.state.store(ThreadState::Running as u8, Ordering::Release);
        tracing::debug!(handle = %self.handle, name = %self.name(), "thread running");

        let result = match catch_unwind(AssertUnwindSafe(|| (self.entry)(argument))) {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("<non-string panic>");
                tracing::error!(handle = %self.handle, message, "thread entry function panicked");
                None
            }
        };

        context::finalize();
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = result;
        // Publishes the result to everyone observing the state change.
        self.state.store(ThreadState::Stopped as u8, Ordering::Release);
        tracing::debug!(handle = %self.handle, "thread stopped");
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use test_case::test_case;

    use super::*;

    fn record() -> ThreadRecord {
        ThreadRecord::new(
            ThreadHandle::from_parts(0, 1),
            Arc::new(|argument| argument),
            "record",
            Priority::Normal,
            0,
        )
    }

    #[test_case("worker", "worker" ; "short")]
    #[test_case("a\0b", "ab" ; "interior nul")]
    #[test_case("0123456789abcdef0123456789abcdefXYZ", "0123456789abcdef0123456789abcdef" ; "truncated")]
    #[test_case("0123456789abcdef0123456789abcdeä", "0123456789abcdef0123456789abcde" ; "char boundary")]
    fn names_are_bounded(name: &str, expected: &str) {
        assert_eq!(bounded_name(name), expected);
    }

    #[test]
    fn start_claims_only_idle_records() {
        let record = record();
        assert_eq!(record.claim_start(), Ok(ThreadState::Created));
        assert_eq!(record.claim_start(), Err(ThreadState::Started));

        record.restore(ThreadState::Created);
        assert_eq!(record.state(), ThreadState::Created);
        assert!(!record.is_started());
    }

    #[test]
    fn run_stores_result_and_stops() {
        let record = Arc::new(record());
        assert_eq!(record.claim_start(), Ok(ThreadState::Created));

        let runner = Arc::clone(&record);
        std::thread::spawn(move || {
            runner.run::<strand_osal_std::thread::Thread>(Some(Payload::new(0x2Au32)));
        })
        .join()
        .unwrap();

        assert_eq!(record.state(), ThreadState::Stopped);
        assert!(!record.is_running());
        assert_ne!(record.native_id(), 0);
        let result = record.result().unwrap();
        assert_eq!(result.downcast_ref::<u32>(), Some(&0x2A));
    }

    #[test]
    fn panicking_entry_stops_without_result() {
        let record = Arc::new(ThreadRecord::new(
            ThreadHandle::from_parts(0, 1),
            Arc::new(|_| panic!("entry failed")),
            "panicking",
            Priority::Normal,
            0,
        ));

        let runner = Arc::clone(&record);
        std::thread::spawn(move || runner.run::<strand_osal_std::thread::Thread>(None))
            .join()
            .unwrap();

        assert_eq!(record.state(), ThreadState::Stopped);
        assert!(record.result().is_none());
    }

    #[test]
    fn terminate_request_is_sticky() {
        let record = record();
        assert!(!record.should_terminate());
        record.request_terminate();
        record.request_terminate();
        assert!(record.should_terminate());
    }
}
