//! Linux and Android backend.

use std::ffi::CString;

use nix::sched::{CpuSet, sched_getaffinity, sched_setaffinity};
use nix::unistd::Pid;
use strand_osal_api::thread::Priority;
use strand_osal_api::{Error, Result};

/// Longest thread name the kernel stores, excluding the terminating NUL.
const MAX_NATIVE_NAME_LENGTH: usize = 15;

/// Pid `0` addresses the calling thread in the scheduler calls.
fn calling_thread() -> Pid {
    Pid::from_raw(0)
}

pub(crate) fn thread_id() -> u64 {
    // Kernel thread ids are positive.
    nix::unistd::gettid().as_raw().unsigned_abs().into()
}

pub(crate) fn hardware_thread() -> u32 {
    // SAFETY: `sched_getcpu` has no preconditions.
    let cpu = unsafe { libc::sched_getcpu() };
    u32::try_from(cpu).unwrap_or(0)
}

pub(crate) fn set_name(name: &str) {
    let name = truncate(name, MAX_NATIVE_NAME_LENGTH);
    let Ok(name) = CString::new(name) else {
        return;
    };
    // SAFETY: `name` is NUL terminated and at most 16 bytes long, `pthread_self` is always a valid thread.
    let result = unsafe { libc::pthread_setname_np(libc::pthread_self(), name.as_ptr()) };
    if result != 0 {
        tracing::debug!(
            error = %std::io::Error::from_raw_os_error(result),
            "failed to set native thread name"
        );
    }
}

pub(crate) fn available_cores() -> u64 {
    match sched_getaffinity(calling_thread()) {
        Ok(set) => (0..CpuSet::count().min(64))
            .filter(|&core| set.is_set(core).unwrap_or(false))
            .fold(0, |mask, core| mask | (1 << core)),
        Err(error) => {
            tracing::debug!(%error, "sched_getaffinity failed, assuming all cores");
            super::mask_for_core_count(
                std::thread::available_parallelism().map_or(1, usize::from),
            )
        }
    }
}

pub(crate) fn set_affinity(mask: u64) -> Result<()> {
    let mut set = CpuSet::new();
    for core in (0..64).filter(|&core| mask & (1 << core) != 0) {
        set.set(core).map_err(|_| Error::InvalidAffinity(mask))?;
    }
    sched_setaffinity(calling_thread(), &set).map_err(|error| {
        tracing::debug!(%error, mask, "sched_setaffinity failed");
        Error::InvalidAffinity(mask)
    })
}

pub(crate) fn set_priority(priority: Priority) -> Result<()> {
    // Linux applies nice values per thread when addressed by thread id.
    let nice: libc::c_int = match priority {
        Priority::Low => 19,
        Priority::BelowNormal => 10,
        Priority::Normal => 0,
        Priority::AboveNormal => -5,
        Priority::Highest => -10,
        Priority::TimeCritical => -20,
    };
    let Ok(tid) = libc::id_t::try_from(thread_id()) else {
        return Err(Error::Unknown);
    };
    // SAFETY: `setpriority` only reads its arguments.
    let result = unsafe { libc::setpriority(libc::PRIO_PROCESS as _, tid, nice) };
    if result == 0 {
        Ok(())
    } else {
        let error = std::io::Error::last_os_error();
        tracing::trace!(%error, nice, "setpriority failed");
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Err(Error::Unsupported),
            _ => Err(Error::Unknown),
        }
    }
}

/// Truncates `name` to at most `max` bytes without splitting a character.
fn truncate(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let end = (0..=max)
        .rev()
        .find(|&index| name.is_char_boundary(index))
        .unwrap_or(0);
    &name[..end]
}
