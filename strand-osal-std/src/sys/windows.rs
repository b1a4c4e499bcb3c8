//! Windows backend.

use strand_osal_api::thread::Priority;
use strand_osal_api::{Error, Result};
use windows_sys::Win32::System::Threading::{
    GetCurrentProcess, GetCurrentProcessorNumber, GetCurrentThread, GetCurrentThreadId,
    GetProcessAffinityMask, SetThreadAffinityMask, SetThreadDescription, SetThreadPriority,
    THREAD_PRIORITY_ABOVE_NORMAL, THREAD_PRIORITY_BELOW_NORMAL, THREAD_PRIORITY_HIGHEST,
    THREAD_PRIORITY_LOWEST, THREAD_PRIORITY_NORMAL, THREAD_PRIORITY_TIME_CRITICAL,
};

pub(crate) fn thread_id() -> u64 {
    // SAFETY: `GetCurrentThreadId` has no preconditions.
    u64::from(unsafe { GetCurrentThreadId() })
}

pub(crate) fn hardware_thread() -> u32 {
    // SAFETY: `GetCurrentProcessorNumber` has no preconditions.
    unsafe { GetCurrentProcessorNumber() }
}

pub(crate) fn set_name(name: &str) {
    let wide: Vec<u16> = name.encode_utf16().chain(core::iter::once(0)).collect();
    // SAFETY: `wide` is NUL terminated and outlives the call, the pseudo handle is always valid.
    let result = unsafe { SetThreadDescription(GetCurrentThread(), wide.as_ptr()) };
    if result < 0 {
        tracing::debug!(hresult = result, "failed to set native thread name");
    }
}

pub(crate) fn available_cores() -> u64 {
    let mut process = 0usize;
    let mut system = 0usize;
    // SAFETY: both out pointers are valid, the pseudo handle is always valid.
    let result = unsafe { GetProcessAffinityMask(GetCurrentProcess(), &mut process, &mut system) };
    if result == 0 || process == 0 {
        tracing::debug!(
            error = %std::io::Error::last_os_error(),
            "GetProcessAffinityMask failed, assuming all cores"
        );
        return super::mask_for_core_count(
            std::thread::available_parallelism().map_or(1, usize::from),
        );
    }
    process as u64
}

pub(crate) fn set_affinity(mask: u64) -> Result<()> {
    // Processor groups beyond the first are not addressed.
    let native = usize::try_from(mask).map_err(|_| Error::InvalidAffinity(mask))?;
    // SAFETY: the pseudo handle is always valid for the calling thread.
    let previous = unsafe { SetThreadAffinityMask(GetCurrentThread(), native) };
    if previous == 0 {
        let error = std::io::Error::last_os_error();
        tracing::debug!(%error, mask, "SetThreadAffinityMask failed");
        return Err(Error::InvalidAffinity(mask));
    }
    Ok(())
}

pub(crate) fn set_priority(priority: Priority) -> Result<()> {
    let level = match priority {
        Priority::Low => THREAD_PRIORITY_LOWEST,
        Priority::BelowNormal => THREAD_PRIORITY_BELOW_NORMAL,
        Priority::Normal => THREAD_PRIORITY_NORMAL,
        Priority::AboveNormal => THREAD_PRIORITY_ABOVE_NORMAL,
        Priority::Highest => THREAD_PRIORITY_HIGHEST,
        Priority::TimeCritical => THREAD_PRIORITY_TIME_CRITICAL,
    };
    // SAFETY: the pseudo handle is always valid for the calling thread.
    let result = unsafe { SetThreadPriority(GetCurrentThread(), level) };
    if result == 0 {
        let error = std::io::Error::last_os_error();
        tracing::trace!(%error, level, "SetThreadPriority failed");
        return Err(Error::Unknown);
    }
    Ok(())
}
