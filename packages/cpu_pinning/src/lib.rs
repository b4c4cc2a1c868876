#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Bind threads to specific logical processors or sets of logical processors.
//!
//! Keeping a thread on a fixed set of processors can improve cache locality and make performance
//! measurements more predictable. This package offers one API for doing so on Linux and on
//! Windows, including Windows systems with more than 64 processors, where processors are
//! divided into processor groups.
//!
//! # Quick start
//!
//! Pin the current thread to processor 0:
//!
//! ```rust no_run
//! // examples/pin_current_thread.rs
//! if !cpu_pinning::set_affinity(0) {
//!     eprintln!("Could not pin the current thread, continuing unpinned.");
//! }
//! ```
//!
//! The `set_affinity*` functions never fail loudly. They log the reason via `tracing` and
//! return `false`. Use [`Affinity`] to get the error instead:
//!
//! ```rust no_run
//! use cpu_pinning::{Affinity, CpuMask};
//!
//! let affinity = Affinity::new()?;
//! println!("The system has {} processors.", affinity.count_cores());
//!
//! affinity.set_mask(&CpuMask::from_cpulist("0,2")?)?;
//! # Ok::<(), cpu_pinning::Error>(())
//! ```
//!
//! # Processor groups
//!
//! On Windows, a thread can only be bound to processors of one processor group at a time. When a
//! [`CpuMask`] spans several groups, each group is applied in increasing order and the last group
//! applied determines where the thread ends up.
//!
//! # Testing
//!
//! The operating system is reached through the [`MaskBindings`] and [`GroupBindings`] traits.
//! Supply your own implementation via [`MaskBackend::with_bindings()`] or
//! [`GroupBackend::with_bindings()`] to exercise either algorithm on any platform.

mod affinity;
mod cpu_mask;
mod error;
mod pal;
mod primitive_types;
mod thread_handle;

pub use affinity::*;
pub use cpu_mask::*;
pub use error::*;
pub use pal::{
    AffinityBackend, AffinityEditor, CpuSet, ERROR_INSUFFICIENT_BUFFER, GroupAffinity,
    GroupBackend, GroupBindings, GroupEditor, MaskBackend, MaskBindings, MaskEditor,
    PlatformBackend, ProcessorGroup, encode_group_topology,
};
pub use primitive_types::*;
pub use thread_handle::*;
