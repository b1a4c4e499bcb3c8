//! Creating, starting and destroying threads.

use core::fmt;
use core::marker::PhantomData;
use core::panic::Location;
use std::sync::{Arc, Mutex, PoisonError};

use strand_osal_api::thread::{Priority, SpawnOptions, ThreadAbstraction};

use crate::config::Config;
use crate::handle::ThreadHandle;
use crate::payload::Payload;
use crate::record::{ThreadRecord, ThreadState};
use crate::registry::{Registry, Released};
use crate::{Error, NativeThread, Result, assert, context};

/// Registry entry of a thread.
struct Entry<P: ThreadAbstraction> {
    record: Arc<ThreadRecord>,
    /// Join handle of the most recent run, `None` before the first start and after joining.
    native: Mutex<Option<P::JoinHandle>>,
}

impl<P: ThreadAbstraction> fmt::Debug for Entry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

impl<P: ThreadAbstraction> Entry<P> {
    /// Waits for the native thread of the most recent run to exit, if it has not been joined yet.
    fn join_native(&self) {
        let mut native = self.native.lock().unwrap_or_else(PoisonError::into_inner);
        match native.take() {
            Some(current) if P::is_current(&current) => {
                *native = Some(current);
                tracing::warn!(handle = %self.record.handle(), "native thread can not join itself");
            }
            Some(other) => {
                if let Err(error) = P::join(other) {
                    tracing::warn!(
                        handle = %self.record.handle(),
                        %error,
                        "failed to join native thread"
                    );
                }
            }
            None => {}
        }
    }
}

/// Owner of a set of threads.
///
/// Threads are addressed by reference-counted [`ThreadHandle`]s: [`create`](Self::create) returns a handle holding
/// one reference, [`ref_handle`](Self::ref_handle) adds one and [`destroy`](Self::destroy) drops one.
/// Dropping the last reference requests termination, joins the native thread and invalidates the handle.
///
/// All operations take `&self`, a system is usually shared between threads via [`Arc`] or a `static`.
/// Dropping the system [shuts down](Self::shutdown) every remaining thread.
pub struct ThreadSystem<P: ThreadAbstraction = NativeThread> {
    registry: Registry<Entry<P>>,
    config: Config,
    _platform: PhantomData<fn() -> P>,
}

impl<P: ThreadAbstraction> fmt::Debug for ThreadSystem<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSystem")
            .field("config", &self.config)
            .field("live_threads", &self.live_threads())
            .finish_non_exhaustive()
    }
}

impl Default for ThreadSystem {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<P: ThreadAbstraction> ThreadSystem<P> {
    /// Creates a system with room for [`Config::max_threads`] threads.
    pub fn new(config: Config) -> Self {
        tracing::debug!(?config, "creating thread system");
        Self {
            registry: Registry::new(config.max_threads),
            config,
            _platform: PhantomData,
        }
    }

    /// Returns the configuration of the system.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a thread in the `Created` state without starting it.
    ///
    /// `entry` runs on every [`start`](Self::start) and receives its argument, its return value becomes the
    /// [thread result](Self::thread_result).
    /// A `stack_size` of `0` uses [`Config::default_stack_size`].
    ///
    /// The returned handle holds one reference.
    pub fn create<F>(
        &self,
        entry: F,
        name: &str,
        priority: Priority,
        stack_size: usize,
    ) -> Result<ThreadHandle>
    where
        F: Fn(Option<Payload>) -> Option<Payload> + Send + Sync + 'static,
    {
        let entry = Arc::new(entry);
        let Some((handle, _)) = self.registry.mint(|handle| Entry {
            record: Arc::new(ThreadRecord::new(handle, entry, name, priority, stack_size)),
            native: Mutex::new(None),
        }) else {
            tracing::warn!(name, capacity = self.registry.capacity(), "thread registry exhausted");
            return Err(Error::RegistryExhausted);
        };

        tracing::debug!(%handle, name, ?priority, stack_size, "thread created");
        Ok(handle)
    }

    /// Creates a thread with the default priority and stack size of the configuration.
    pub fn create_default<F>(&self, entry: F, name: &str) -> Result<ThreadHandle>
    where
        F: Fn(Option<Payload>) -> Option<Payload> + Send + Sync + 'static,
    {
        self.create(entry, name, self.config.default_priority, 0)
    }

    /// Adds a reference to `handle`.
    ///
    /// Returns `None` if the handle is invalid or its destruction has already been committed.
    pub fn ref_handle(&self, handle: ThreadHandle) -> Option<ThreadHandle> {
        self.registry.retain(handle).then_some(handle)
    }

    /// Starts the entry function on a new native thread and hands it `argument`.
    ///
    /// Threads can be started when created or after their entry function returned.
    /// Restarting a stopped thread first joins the native thread of the previous run.
    /// Fails with [`Error::AlreadyRunning`] while a run is in progress, nothing is queued in that case.
    /// If the native thread can not be spawned the thread keeps its previous state and may be started again.
    #[track_caller]
    pub fn start(&self, handle: ThreadHandle, argument: Option<Payload>) -> Result<()> {
        let entry = self.resolve(handle, "start")?;
        let record = &entry.record;

        let previous = record.claim_start().map_err(|state| {
            tracing::debug!(%handle, ?state, "thread already running");
            Error::AlreadyRunning(handle)
        })?;

        let mut native = entry.native.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(finished) = native.take()
            && let Err(error) = P::join(finished)
        {
            tracing::warn!(%handle, %error, "failed to join previous run");
        }

        let name = record.name();
        let stack_size = match record.stack_size() {
            0 => self.config.default_stack_size,
            stack_size => stack_size,
        };
        let options = SpawnOptions {
            name: &name,
            stack_size,
            priority: record.priority(),
            affinity: record.affinity(),
        };
        // Published before spawning so nobody observes a running thread that is not started.
        record.mark_started();
        let body = {
            let record = Arc::clone(record);
            Box::new(move || record.run::<P>(argument))
        };

        match P::spawn(options, body) {
            Ok(join_handle) => {
                *native = Some(join_handle);
                tracing::debug!(%handle, name, "thread started");
                Ok(())
            }
            Err(error) => {
                record.restore(previous);
                if previous == ThreadState::Created {
                    record.clear_started();
                }
                tracing::warn!(%handle, name, %error, "failed to start thread");
                Err(error.into())
            }
        }
    }

    /// Requests the thread to terminate.
    ///
    /// Termination is cooperative: the entry function has to poll [`context::should_terminate`] and return.
    #[track_caller]
    pub fn terminate(&self, handle: ThreadHandle) -> Result<()> {
        let entry = self.resolve(handle, "terminate")?;
        entry.record.request_terminate();
        tracing::debug!(%handle, "thread termination requested");
        Ok(())
    }

    /// Waits until the entry function of the current run has returned and returns the thread result.
    ///
    /// Returns immediately for threads that have not been started or have already been joined.
    /// The handle stays valid.
    #[track_caller]
    pub fn join(&self, handle: ThreadHandle) -> Result<Option<Payload>> {
        let entry = self.resolve(handle, "join")?;
        // Handle values repeat across systems, only the record identifies the calling thread.
        if context::is_current(&entry.record) {
            return Err(Error::JoinSelf(handle));
        }
        entry.join_native();
        Ok(entry.record.result())
    }

    /// Drops a reference to the thread.
    ///
    /// Dropping the last reference requests termination and blocks until the native thread has exited, which never
    /// happens if the entry function does not return.
    /// A thread dropping the last reference to itself can not wait for its own exit, it is detached instead.
    #[track_caller]
    pub fn destroy(&self, handle: ThreadHandle) -> Result<()> {
        match self.registry.release(handle) {
            Released::Invalid => Err(self.invalid_handle(handle, "destroy")),
            Released::Retained => {
                tracing::trace!(%handle, "thread reference released");
                Ok(())
            }
            Released::Last(entry) => {
                self.dispose(handle, &entry);
                Ok(())
            }
        }
    }

    /// Terminates, joins and frees a thread whose last reference is gone.
    fn dispose(&self, handle: ThreadHandle, entry: &Entry<P>) {
        entry.record.request_terminate();
        if context::is_current(&entry.record) {
            tracing::warn!(%handle, "thread destroyed from itself, detaching native thread");
        } else {
            entry.join_native();
        }
        self.registry.free(handle);
        tracing::debug!(%handle, "thread destroyed");
    }

    /// Terminates and destroys every thread regardless of outstanding references.
    ///
    /// Blocks until all native threads have exited.
    pub fn shutdown(&self) {
        let handles = self.registry.live_handles();
        if handles.is_empty() {
            return;
        }
        tracing::debug!(threads = handles.len(), "shutting down threads");

        // Request all terminations first so the threads wind down concurrently.
        let entries: Vec<_> = handles
            .into_iter()
            .filter_map(|handle| Some((handle, self.registry.revoke(handle)?)))
            .inspect(|(_, entry)| entry.record.request_terminate())
            .collect();
        for (handle, entry) in entries {
            self.dispose(handle, &entry);
        }
    }

    /// Returns the number of threads with at least one reference.
    pub fn live_threads(&self) -> usize {
        self.registry.live_handles().len()
    }

    /// Returns `true` if `handle` refers to a live thread of this system.
    pub fn is_thread(&self, handle: ThreadHandle) -> bool {
        self.registry.resolve(handle).is_some()
    }

    /// Returns `true` once the thread has been started, it stays `true` after the entry function returned.
    #[track_caller]
    pub fn is_started(&self, handle: ThreadHandle) -> bool {
        self.resolve(handle, "is_started")
            .is_ok_and(|entry| entry.record.is_started())
    }

    /// Returns `true` while the entry function is executing.
    #[track_caller]
    pub fn is_running(&self, handle: ThreadHandle) -> bool {
        self.resolve(handle, "is_running")
            .is_ok_and(|entry| entry.record.is_running())
    }

    /// Returns `true` once termination of the thread has been requested.
    #[track_caller]
    pub fn should_terminate(&self, handle: ThreadHandle) -> bool {
        self.resolve(handle, "should_terminate")
            .is_ok_and(|entry| entry.record.should_terminate())
    }

    /// Returns the lifecycle state of the thread.
    #[track_caller]
    pub fn state(&self, handle: ThreadHandle) -> Result<ThreadState> {
        Ok(self.resolve(handle, "state")?.record.state())
    }

    /// Returns the value the entry function returned on its last completed run.
    ///
    /// `None` while a run is in progress, before the first run and if the entry function returned nothing.
    #[track_caller]
    pub fn thread_result(&self, handle: ThreadHandle) -> Option<Payload> {
        let entry = self.resolve(handle, "thread_result").ok()?;
        (entry.record.state() == ThreadState::Stopped)
            .then(|| entry.record.result())
            .flatten()
    }

    /// Returns the name of the thread.
    #[track_caller]
    pub fn name(&self, handle: ThreadHandle) -> Result<String> {
        Ok(self.resolve(handle, "name")?.record.name())
    }

    /// Returns the priority the thread was created with.
    #[track_caller]
    pub fn priority(&self, handle: ThreadHandle) -> Result<Priority> {
        Ok(self.resolve(handle, "priority")?.record.priority())
    }

    /// Returns the native id of the thread, `0` until it has been started for the first time.
    #[track_caller]
    pub fn native_id(&self, handle: ThreadHandle) -> Result<u64> {
        Ok(self.resolve(handle, "native_id")?.record.native_id())
    }

    /// Restricts the thread to the cores in `mask` from its next start on, `0` removes the restriction.
    ///
    /// A running thread applies a new mask to itself with [`context::set_hardware`].
    #[track_caller]
    pub fn set_affinity(&self, handle: ThreadHandle, mask: u64) -> Result<()> {
        self.resolve(handle, "set_affinity")?.record.set_affinity(mask);
        tracing::debug!(%handle, mask, "thread affinity stored");
        Ok(())
    }

    #[track_caller]
    fn resolve(&self, handle: ThreadHandle, operation: &'static str) -> Result<Arc<Entry<P>>> {
        // A closure would hide the caller location from `invalid_handle`.
        match self.registry.resolve(handle) {
            Some(entry) => Ok(entry),
            None => Err(self.invalid_handle(handle, operation)),
        }
    }

    #[track_caller]
    fn invalid_handle(&self, handle: ThreadHandle, operation: &'static str) -> Error {
        let location = Location::caller();
        tracing::warn!(%handle, operation, "invalid thread handle");
        assert::report_formatted(
            Some("is_thread(handle)"),
            Some(location.file()),
            location.line(),
            format_args!("{operation} called with invalid thread handle {handle}"),
        );
        Error::InvalidHandle(handle)
    }
}

impl<P: ThreadAbstraction> Drop for ThreadSystem<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
