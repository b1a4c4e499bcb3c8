//! Abstractions for attaching threads to a host virtual machine.
//!
//! Some platforms run native code inside a managed host (for example an application virtual machine that native
//! libraries call back into).
//! Every native thread that wants to call into such a host needs a per-thread execution environment which is obtained
//! by attaching the thread and must be released again by detaching it before the thread exits.

use core::ffi::c_void;
use core::ptr::NonNull;

use crate::Result;

/// Opaque pointer to the per-thread execution environment handed out by a [`VirtualMachine`].
pub type EnvironmentPtr = NonNull<c_void>;

/// A host virtual machine that native threads can attach to.
pub trait VirtualMachine: Send + Sync {
    /// Attaches the calling thread and returns its execution environment.
    ///
    /// Implementations may assume they are only called once per thread between detaches.
    fn attach_current_thread(&self) -> Result<EnvironmentPtr>;

    /// Detaches the calling thread.
    ///
    /// Any environment previously returned for this thread is invalid afterwards.
    fn detach_current_thread(&self);
}
