//! Traits for showing diagnostic messages to the user.

/// `MessageDisplay` is used to present diagnostic messages in a platform-agnostic manner.
///
/// Depending on the platform this is a modal message box, a system log entry or plain text on an output stream.
pub trait MessageDisplay: Send + Sync + 'static {
    /// Shows `message` under the given `title`.
    ///
    /// Must not block for longer than it takes to emit the message.
    fn show(title: &str, message: &str);
}
