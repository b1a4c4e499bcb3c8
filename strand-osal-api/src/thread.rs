//! Abstractions for native thread operations.

use alloc::boxed::Box;
use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Scheduling priority requested for a native thread.
///
/// Platforms map these onto whatever their native scheduler offers.
/// Raising the priority above [`Priority::Normal`] may need privileges the process does not have, in which case the
/// request is ignored by the platform and the thread keeps running at its inherited priority.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Lowest priority, for background work.
    Low,
    /// Below the normal priority.
    BelowNormal,
    /// The default priority of new threads.
    #[default]
    Normal,
    /// Above the normal priority.
    AboveNormal,
    /// Highest regular priority.
    Highest,
    /// Time critical priority, above every regular priority.
    TimeCritical,
}

/// Parameters for spawning a native thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnOptions<'a> {
    /// Name given to the native thread, visible in debuggers and profilers.
    pub name: &'a str,
    /// Requested stack size in bytes, `0` selects the platform default.
    pub stack_size: usize,
    /// Requested scheduling priority.
    pub priority: Priority,
    /// Bit-per-core mask of the cores the thread may run on, `0` leaves the thread unconstrained.
    pub affinity: u64,
}

impl Default for SpawnOptions<'_> {
    fn default() -> Self {
        Self {
            name: "",
            stack_size: 0,
            priority: Priority::Normal,
            affinity: 0,
        }
    }
}

/// The body executed by a spawned native thread.
pub type ThreadBody = Box<dyn FnOnce() + Send + 'static>;

/// `ThreadAbstraction` is used to create and query native threads in a platform-agnostic manner.
///
/// All operations without a [`JoinHandle`][ThreadAbstraction::JoinHandle] act on the calling thread.
pub trait ThreadAbstraction: 'static {
    /// Owned handle to a spawned native thread, consumed by [`join`][ThreadAbstraction::join].
    type JoinHandle: Send + 'static;

    /// Spawns a new native thread running `body`.
    ///
    /// The stack size and name are applied at creation, priority and affinity on entry of the new thread before
    /// `body` runs.
    /// An affinity mask that does not contain any core available to the process is rejected before a thread is
    /// created.
    fn spawn(options: SpawnOptions<'_>, body: ThreadBody) -> Result<Self::JoinHandle>;

    /// Blocks until the thread behind `handle` has exited.
    ///
    /// Returns an error if the thread terminated abnormally.
    fn join(handle: Self::JoinHandle) -> Result<()>;

    /// Returns `true` if `handle` refers to the calling thread.
    ///
    /// A thread can never join itself, callers use this to detect that case.
    fn is_current(handle: &Self::JoinHandle) -> bool;

    /// Returns the operating system id of the calling thread.
    ///
    /// The returned id is never zero.
    fn current_thread_id() -> u64;

    /// Returns the hardware thread (core) the calling thread is currently scheduled on.
    ///
    /// Platforms without a way to query this return `0`.
    fn current_hardware_thread() -> u32;

    /// Sets the native name of the calling thread.
    ///
    /// Platforms truncate the name to whatever length their native API supports.
    fn set_current_name(name: &str);

    /// Restricts the calling thread to the cores in `mask`.
    fn set_current_affinity(mask: u64) -> Result<()>;

    /// Changes the scheduling priority of the calling thread.
    fn set_current_priority(priority: Priority) -> Result<()>;

    /// Blocks the calling thread for at least `duration`.
    fn sleep(duration: Duration);

    /// Gives up the remainder of the calling thread's timeslice.
    fn yield_now();
}

#[doc(hidden)]
#[cfg(feature = "test-suites")]
#[cfg_attr(coverage_nightly, coverage(off))]
pub mod test_suite {
    #![expect(missing_docs, reason = "tests")]
    //! Test suite for [`ThreadAbstraction`] implementations.

    use std::boxed::Box;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use crate::Error;
    use crate::thread::{Priority, SpawnOptions, ThreadAbstraction};

    pub fn test_spawn_join<T: ThreadAbstraction>() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = T::spawn(
            SpawnOptions {
                name: "suite-spawn",
                ..SpawnOptions::default()
            },
            Box::new({
                let counter = counter.clone();
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }),
        )
        .unwrap();

        T::join(handle).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    pub fn test_stack_size<T: ThreadAbstraction>() {
        // Large enough to overflow a tiny default stack if the size was ignored.
        let handle = T::spawn(
            SpawnOptions {
                name: "suite-stack",
                stack_size: 8 * 1024 * 1024,
                ..SpawnOptions::default()
            },
            Box::new(|| {
                let buffer = [1u8; 4 * 1024 * 1024];
                let sum: usize = std::hint::black_box(&buffer)
                    .iter()
                    .map(|&byte| usize::from(byte))
                    .sum();
                assert_eq!(sum, buffer.len());
            }),
        )
        .unwrap();

        T::join(handle).unwrap();
    }

    pub fn test_thread_id_unique<T: ThreadAbstraction>() {
        let spawned_id = Arc::new(AtomicU64::new(0));
        let handle = T::spawn(
            SpawnOptions::default(),
            Box::new({
                let spawned_id = spawned_id.clone();
                move || spawned_id.store(T::current_thread_id(), Ordering::SeqCst)
            }),
        )
        .unwrap();
        T::join(handle).unwrap();

        let own_id = T::current_thread_id();
        assert_ne!(own_id, 0);
        assert_eq!(
            own_id,
            T::current_thread_id(),
            "id should be stable within a thread"
        );
        assert_ne!(spawned_id.load(Ordering::SeqCst), 0);
        assert_ne!(spawned_id.load(Ordering::SeqCst), own_id);
    }

    pub fn test_is_current<T: ThreadAbstraction>() {
        let (sender, receiver) = std::sync::mpsc::channel::<bool>();
        let (handle_sender, handle_receiver) = std::sync::mpsc::channel::<()>();
        let handle = T::spawn(
            SpawnOptions::default(),
            Box::new(move || {
                // Wait until the spawning thread has checked the handle.
                handle_receiver.recv().unwrap();
                sender.send(true).unwrap();
            }),
        )
        .unwrap();

        assert!(!T::is_current(&handle));
        handle_sender.send(()).unwrap();
        assert!(receiver.recv().unwrap());
        T::join(handle).unwrap();
    }

    pub fn test_invalid_affinity<T: ThreadAbstraction>() {
        let cores = std::thread::available_parallelism().map_or(1, usize::from);
        if cores >= 64 {
            // Every bit could name a real core.
            return;
        }

        let mask = 1u64 << 63;
        let result = T::spawn(
            SpawnOptions {
                affinity: mask,
                ..SpawnOptions::default()
            },
            Box::new(|| {}),
        );
        assert!(matches!(result, Err(Error::InvalidAffinity(m)) if m == mask));
    }

    pub fn test_priority_is_not_fatal<T: ThreadAbstraction>() {
        for priority in [Priority::Low, Priority::Normal, Priority::TimeCritical] {
            let handle = T::spawn(
                SpawnOptions {
                    priority,
                    ..SpawnOptions::default()
                },
                Box::new(|| {}),
            )
            .unwrap();
            T::join(handle).unwrap();
        }
    }

    pub fn test_sleep<T: ThreadAbstraction>() {
        let start = Instant::now();
        T::sleep(Duration::from_millis(20));
        assert!(start.elapsed() >= Duration::from_millis(20));
        T::yield_now();
    }
}
