/// A result with the [`Error`] error.
pub type Result<T> = core::result::Result<T, Error>;

/// An error that may happen during platform thread operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Run out of memory during the action.
    #[error("out of memory")]
    OutOfMemory,
    /// The native thread could not be spawned.
    #[error("failed to spawn native thread")]
    Spawn,
    /// The affinity mask does not name any core the thread may run on.
    #[error("invalid affinity mask {0:#x}")]
    InvalidAffinity(u64),
    /// The operation is not available on this platform.
    #[error("operation not supported on this platform")]
    Unsupported,
    /// Could not apply the operation due to unknown error.
    #[error("unknown error")]
    Unknown,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::string::ToString;

    use super::Error;

    #[test]
    fn invalid_affinity_shows_mask() {
        assert_eq!(
            Error::InvalidAffinity(0x30).to_string(),
            "invalid affinity mask 0x30"
        );
    }
}
