//! Configuration of a [`ThreadSystem`](crate::ThreadSystem).

use serde::{Deserialize, Serialize};

/// Settings of a [`ThreadSystem`](crate::ThreadSystem).
///
/// Deserializes from partial input, missing fields keep their default:
///
/// ```
/// let config: strand::Config = serde_json::from_str(r#"{ "max_threads": 64 }"#)?;
/// assert_eq!(config.max_threads, 64);
/// assert_eq!(config.default_stack_size, 0);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Number of threads that can exist at the same time.
    pub max_threads: usize,
    /// Stack size in bytes for threads created without one, `0` uses the platform default.
    pub default_stack_size: usize,
    /// Priority of threads created through [`ThreadSystem::create_default`](crate::ThreadSystem::create_default).
    pub default_priority: crate::Priority,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_threads: 1024,
            default_stack_size: 0,
            default_priority: crate::Priority::Normal,
        }
    }
}
