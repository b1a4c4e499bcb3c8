//! Opaque thread handles.

use core::fmt;

/// Opaque identifier of a thread created through a [`ThreadSystem`](crate::ThreadSystem).
///
/// Handles are plain values: copying one does not take a reference, use
/// [`ThreadSystem::ref_handle`](crate::ThreadSystem::ref_handle) for that.
/// A handle outlives the thread it names, once the thread has been destroyed the handle stays invalid even if its
/// registry slot is reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ThreadHandle(u64);

impl ThreadHandle {
    /// The invalid handle, never refers to a thread.
    pub const NULL: Self = Self(0);

    /// Creates a handle from its raw value, e.g. after passing it through foreign code.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value of the handle.
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Returns `true` for [`ThreadHandle::NULL`].
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub(crate) const fn from_parts(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64 + 1))
    }

    /// Registry slot index, `None` for the null handle.
    pub(crate) const fn index(self) -> Option<u32> {
        (self.0 as u32).checked_sub(1)
    }

    pub(crate) const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index() {
            Some(index) => write!(f, "#{index}.{}", self.generation()),
            None => f.write_str("#null"),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use test_case::test_case;

    use super::ThreadHandle;

    #[test_case(0, 1 ; "first slot")]
    #[test_case(7, 3 ; "reused slot")]
    #[test_case(u32::MAX - 1, u32::MAX ; "last slot")]
    fn parts_survive_encoding(index: u32, generation: u32) {
        let handle = ThreadHandle::from_parts(index, generation);
        assert!(!handle.is_null());
        assert_eq!(handle.index(), Some(index));
        assert_eq!(handle.generation(), generation);
        assert_eq!(ThreadHandle::from_raw(handle.as_raw()), handle);
    }

    #[test]
    fn null_handle_has_no_slot() {
        assert!(ThreadHandle::NULL.is_null());
        assert_eq!(ThreadHandle::default(), ThreadHandle::NULL);
        assert_eq!(ThreadHandle::NULL.index(), None);
        assert_eq!(ThreadHandle::NULL.to_string(), "#null");
    }

    #[test]
    fn display_names_slot_and_generation() {
        assert_eq!(ThreadHandle::from_parts(4, 2).to_string(), "#4.2");
    }
}
