//! Native thread primitives.

use std::time::Duration;

pub use strand_osal_api::thread::{Priority, SpawnOptions, ThreadAbstraction, ThreadBody};
use strand_osal_api::{Error, Result};

use crate::sys;

/// Implements the [`ThreadAbstraction`] trait for standard Rust.
///
/// Threads are created through [`std::thread::Builder`], everything std does not cover is delegated to the native
/// API of the target.
#[derive(Debug)]
pub struct Thread;

impl ThreadAbstraction for Thread {
    type JoinHandle = std::thread::JoinHandle<()>;

    fn spawn(options: SpawnOptions<'_>, body: ThreadBody) -> Result<Self::JoinHandle> {
        let SpawnOptions {
            name,
            stack_size,
            priority,
            affinity,
        } = options;

        if affinity != 0 && affinity & sys::available_cores() == 0 {
            return Err(Error::InvalidAffinity(affinity));
        }

        let mut builder = std::thread::Builder::new();
        if !name.is_empty() {
            // std panics on interior NUL bytes in thread names.
            builder = builder.name(name.replace('\0', ""));
        }
        if stack_size != 0 {
            builder = builder.stack_size(stack_size);
        }

        builder
            .spawn(move || {
                if priority != Priority::Normal
                    && let Err(error) = sys::set_priority(priority)
                {
                    tracing::debug!(?priority, %error, "thread priority not applied");
                }
                if affinity != 0
                    && let Err(error) = sys::set_affinity(affinity)
                {
                    tracing::debug!(affinity, %error, "thread affinity not applied");
                }
                body();
            })
            .map_err(|error| {
                tracing::warn!(%error, "failed to spawn native thread");
                match error.kind() {
                    std::io::ErrorKind::OutOfMemory => Error::OutOfMemory,
                    _ => Error::Spawn,
                }
            })
    }

    fn join(handle: Self::JoinHandle) -> Result<()> {
        handle.join().map_err(|_panic| Error::Unknown)
    }

    fn is_current(handle: &Self::JoinHandle) -> bool {
        handle.thread().id() == std::thread::current().id()
    }

    fn current_thread_id() -> u64 {
        sys::thread_id()
    }

    fn current_hardware_thread() -> u32 {
        sys::hardware_thread()
    }

    fn set_current_name(name: &str) {
        sys::set_name(name);
    }

    fn set_current_affinity(mask: u64) -> Result<()> {
        if mask == 0 || mask & sys::available_cores() == 0 {
            return Err(Error::InvalidAffinity(mask));
        }
        sys::set_affinity(mask)
    }

    fn set_current_priority(priority: Priority) -> Result<()> {
        sys::set_priority(priority)
    }

    fn sleep(duration: Duration) {
        std::thread::sleep(duration);
    }

    fn yield_now() {
        std::thread::yield_now();
    }
}
