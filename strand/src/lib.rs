//! Reference-counted handles over native threads.
//!
//! A [`ThreadSystem`] owns threads and hands out [`ThreadHandle`]s for them.
//! Handles can be shared, queried and destroyed from any thread; the last [`destroy`](ThreadSystem::destroy)
//! requests termination, joins the native thread and invalidates the handle.
//! Termination is cooperative, entry functions poll [`context::should_terminate`].
//!
//! ```
//! use strand::{Payload, Priority, ThreadSystem, context};
//!
//! let system = ThreadSystem::default();
//! let worker = system.create(
//!     |argument| {
//!         assert_eq!(context::name(), "worker");
//!         let input = *argument?.downcast_ref::<u32>()?;
//!         Some(Payload::new(input * 2))
//!     },
//!     "worker",
//!     Priority::Normal,
//!     0,
//! )?;
//!
//! system.start(worker, Some(Payload::new(21u32)))?;
//! let result = system.join(worker)?;
//! assert_eq!(result.unwrap().downcast_ref::<u32>(), Some(&42));
//! assert!(!system.is_running(worker));
//!
//! system.destroy(worker)?;
//! assert!(!system.is_thread(worker));
//! # Ok::<(), strand::Error>(())
//! ```
//!
//! Misuse, like operating on a destroyed handle, is reported through [`assert`] and returns
//! [`Error::InvalidHandle`].

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod assert;
mod config;
pub mod context;
mod error;
mod handle;
mod payload;
mod record;
mod registry;
mod system;

pub use config::Config;
pub use error::{Error, Result};
pub use handle::ThreadHandle;
pub use payload::Payload;
pub use record::{MAX_NAME_LENGTH, ThreadState};
pub use strand_osal_api::thread::{Priority, ThreadAbstraction};
#[cfg(any(target_os = "android", feature = "managed-runtime"))]
pub use strand_osal_std::vm;
pub use system::ThreadSystem;

/// Native threads of the host, used for the calling thread in [`context`] and by default in [`ThreadSystem`].
pub type NativeThread = strand_osal_std::thread::Thread;
