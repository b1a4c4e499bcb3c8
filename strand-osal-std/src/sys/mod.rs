//! Target specific native thread calls.
//!
//! Every backend provides the same set of free functions operating on the calling thread.

#[cfg(any(target_os = "linux", target_os = "android"))]
mod linux;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use linux::*;

#[cfg(target_vendor = "apple")]
mod apple;
#[cfg(target_vendor = "apple")]
pub(crate) use apple::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use windows::*;

#[cfg(not(any(target_os = "linux", target_os = "android", target_vendor = "apple", windows)))]
mod fallback;
#[cfg(not(any(target_os = "linux", target_os = "android", target_vendor = "apple", windows)))]
pub(crate) use fallback::*;

/// Mask of the first `cores` cores, saturating at 64.
pub(crate) fn mask_for_core_count(cores: usize) -> u64 {
    match cores {
        0 => 1,
        1..64 => (1u64 << cores) - 1,
        _ => u64::MAX,
    }
}
