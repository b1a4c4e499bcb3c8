//! Attaching native threads to a host virtual machine.
//!
//! The host registers its [`VirtualMachine`] once with [`register`].
//! Afterwards any thread can call [`attach`] to obtain its execution environment, repeated calls return the cached
//! environment without attaching again.
//! [`detach`] must be called before an attached thread exits.

use std::cell::Cell;
use std::sync::OnceLock;

pub use strand_osal_api::vm::{EnvironmentPtr, VirtualMachine};
use strand_osal_api::{Error, Result};

static MACHINE: OnceLock<&'static dyn VirtualMachine> = OnceLock::new();

thread_local! {
    /// Environment of the calling thread while it is attached.
    static ENVIRONMENT: Cell<Option<EnvironmentPtr>> = const { Cell::new(None) };
}

/// Error returned by [`register`] if a virtual machine has already been registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a virtual machine has already been registered")]
pub struct AlreadyRegistered;

/// Registers the process-wide virtual machine.
///
/// Only the first registration succeeds.
pub fn register(
    machine: &'static dyn VirtualMachine,
) -> core::result::Result<(), AlreadyRegistered> {
    MACHINE.set(machine).map_err(|_| AlreadyRegistered)
}

/// Returns `true` once a virtual machine has been registered.
pub fn is_registered() -> bool {
    MACHINE.get().is_some()
}

/// Attaches the calling thread to the registered virtual machine and returns its execution environment.
///
/// Idempotent per thread: an already attached thread gets its cached environment back.
/// Fails with [`Error::Unsupported`] if no virtual machine has been registered.
pub fn attach() -> Result<EnvironmentPtr> {
    if let Some(environment) = ENVIRONMENT.get() {
        return Ok(environment);
    }

    let machine = MACHINE.get().ok_or(Error::Unsupported)?;
    let environment = machine.attach_current_thread()?;
    ENVIRONMENT.set(Some(environment));
    tracing::trace!("thread attached to virtual machine");
    Ok(environment)
}

/// Returns the environment of the calling thread if it is attached.
pub fn environment() -> Option<EnvironmentPtr> {
    ENVIRONMENT.get()
}

/// Detaches the calling thread from the virtual machine.
///
/// Does nothing if the thread is not attached.
pub fn detach() {
    if ENVIRONMENT.take().is_none() {
        return;
    }

    if let Some(machine) = MACHINE.get() {
        machine.detach_current_thread();
        tracing::trace!("thread detached from virtual machine");
    }
}
