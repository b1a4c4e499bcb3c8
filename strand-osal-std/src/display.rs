//! Diagnostic message display.

use std::io::Write;

pub use strand_osal_api::display::MessageDisplay;

/// Implements the [`MessageDisplay`] trait by printing to standard error.
#[derive(Debug)]
pub struct Console;

impl MessageDisplay for Console {
    /// Prints to [`std::io::stderr`].
    fn show(title: &str, message: &str) {
        let mut stderr = std::io::stderr().lock();
        // this is a diagnostic path, ignore any errors writing
        let _ = std::writeln!(stderr, "{title}");
        let _ = std::write!(stderr, "{message}");
        let _ = stderr.flush();
    }
}
