//! The Strand operating system abstraction layer API.
//!
//! Everything the thread core needs from the host operating system is expressed through the traits in this crate:
//!
//! - [`thread::ThreadAbstraction`]: spawning, joining and configuring native threads.
//! - [`display::MessageDisplay`]: showing diagnostic messages to the user.
//! - [`vm::VirtualMachine`]: attaching threads to a host virtual machine.

#![no_std]
#![forbid(unsafe_code)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

#[cfg(any(test, feature = "test-suites"))]
extern crate std;

mod error;
pub mod display;
pub mod thread;
pub mod vm;

pub use error::{Error, Result};
