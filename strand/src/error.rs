use crate::handle::ThreadHandle;

/// A result type using [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors of thread operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No free slot for another thread.
    #[error("thread registry exhausted")]
    RegistryExhausted,
    /// The handle does not refer to a live thread.
    #[error("invalid thread handle {0}")]
    InvalidHandle(ThreadHandle),
    /// The thread has been started and its entry function has not returned yet.
    #[error("thread {0} is already running")]
    AlreadyRunning(ThreadHandle),
    /// A thread tried to wait for its own exit.
    #[error("thread {0} can not join itself")]
    JoinSelf(ThreadHandle),
    /// The native thread call failed.
    #[error(transparent)]
    Platform(#[from] strand_osal_api::Error),
}
