//! Failure reporting for programmer errors.
//!
//! Misuse such as operating on an invalid handle is never fatal.
//! It is reported to the process-wide [`AssertHandler`] and the operation turns into a no-op.
//! Without a handler the failure is shown through a [`MessageDisplay`], by default the [`Console`].

use core::fmt;
use core::fmt::Write as _;
use std::sync::{PoisonError, RwLock};

pub use strand_osal_api::display::MessageDisplay;
pub use strand_osal_std::display::Console;

/// Maximum length of a report message in bytes.
pub const BUFFER_SIZE: usize = 2048;

/// Title of the message shown when no handler is installed.
pub const TITLE: &str = "Assert Failure";

/// Receives a failure report: condition, source file, line and message.
///
/// The return value is passed on to the caller of [`report`].
pub type AssertHandler = fn(condition: &str, file: &str, line: u32, message: &str) -> i32;

type DisplayFn = fn(title: &str, message: &str);

static HANDLER: RwLock<Option<AssertHandler>> = RwLock::new(None);
static DISPLAY: RwLock<DisplayFn> = RwLock::new(Console::show as DisplayFn);

/// Returns the installed handler.
pub fn handler() -> Option<AssertHandler> {
    *HANDLER.read().unwrap_or_else(PoisonError::into_inner)
}

/// Installs `handler`, or restores the default message display with `None`.
pub fn set_handler(handler: Option<AssertHandler>) {
    *HANDLER.write().unwrap_or_else(PoisonError::into_inner) = handler;
}

/// Shows failures through `D` while no handler is installed.
pub fn set_display<D: MessageDisplay>() {
    *DISPLAY.write().unwrap_or_else(PoisonError::into_inner) = D::show;
}

/// Reports a failure.
///
/// Missing parts are replaced by placeholders.
/// Returns the result of the installed handler, or `0` after showing the failure.
pub fn report(
    condition: Option<&str>,
    file: Option<&str>,
    line: u32,
    message: Option<&str>,
) -> i32 {
    let condition = condition.unwrap_or("<Static fail>");
    let file = file.unwrap_or("<No file>");
    let message = message.unwrap_or("<No message>");

    tracing::error!(condition, file, line, message, "assertion failed");

    if let Some(handler) = handler() {
        return handler(condition, file, line, message);
    }

    let text = layout(condition, file, line, "", message);
    let display = *DISPLAY.read().unwrap_or_else(PoisonError::into_inner);
    display(TITLE, &text);
    0
}

/// Reports a failure with a formatted message bounded to [`BUFFER_SIZE`].
///
/// Usually called through [`report_failure!`](crate::report_failure).
pub fn report_formatted(
    condition: Option<&str>,
    file: Option<&str>,
    line: u32,
    message: fmt::Arguments<'_>,
) -> i32 {
    let mut buffer = String::new();
    // Formatting into a `String` only fails if a `Display` implementation does, the partial output is reported then.
    let _ = buffer.write_fmt(message);
    truncate(&mut buffer);
    report(condition, file, line, Some(&buffer))
}

/// Builds the text shown for a failure without handler.
pub fn layout(condition: &str, file: &str, line: u32, context: &str, message: &str) -> String {
    let mut text = format!(
        "****** ASSERT FAILED ******\nCondition: {condition}\nFile/line: {file} : {line}\n{context}{message}\n"
    );
    truncate(&mut text);
    text
}

/// Cuts `text` to less than [`BUFFER_SIZE`] bytes, leaving room for a terminator when passed to foreign code.
fn truncate(text: &mut String) {
    if text.len() < BUFFER_SIZE {
        return;
    }
    let end = (0..BUFFER_SIZE)
        .rev()
        .find(|&index| text.is_char_boundary(index))
        .unwrap_or(0);
    text.truncate(end);
}

/// Reports a failed condition with a formatted message at the current source location.
///
/// ```
/// let queue_len = 3;
/// strand::report_failure!("queue_len == 0", "queue still holds {queue_len} items");
/// ```
#[macro_export]
macro_rules! report_failure {
    ($condition:expr, $($message:tt)+) => {
        $crate::assert::report_formatted(
            ::core::option::Option::Some($condition),
            ::core::option::Option::Some(::core::file!()),
            ::core::line!(),
            ::core::format_args!($($message)+),
        )
    };
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn layout_matches_report_box() {
        assert_eq!(
            layout("x > 0", "src/lib.rs", 12, "", "x was -1"),
            "****** ASSERT FAILED ******\nCondition: x > 0\nFile/line: src/lib.rs : 12\nx was -1\n"
        );
    }

    #[test]
    fn layout_is_bounded() {
        let message = "m".repeat(BUFFER_SIZE * 2);
        let text = layout("c", "f", 1, "", &message);
        assert_eq!(text.len(), BUFFER_SIZE - 1);
        assert!(text.starts_with("****** ASSERT FAILED ******\n"));
    }

    #[test]
    fn truncation_keeps_characters_whole() {
        let mut text = "ä".repeat(BUFFER_SIZE);
        truncate(&mut text);
        assert_eq!(text.len(), BUFFER_SIZE - 2);
        assert!(text.chars().all(|character| character == 'ä'));
    }
}
