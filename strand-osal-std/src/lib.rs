//! Std operating system abstraction layer for Strand.
//!
//! This provides the native thread primitives Strand needs on top of the std library, using `libc` and `nix` where
//! std has no portable equivalent (thread ids, core affinity, priorities, renaming the calling thread).

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod display;
pub mod thread;
#[cfg(any(target_os = "android", feature = "managed-runtime"))]
pub mod vm;

mod sys;

pub use strand_osal_api::{Error, Result};
