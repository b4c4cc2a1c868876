use std::io;
#[cfg(not(target_os = "linux"))]
use std::num::NonZero;

#[cfg(target_os = "linux")]
use static_assertions::const_assert_eq;

use crate::pal::mask_based::{CpuSet, MaskBindings};
use crate::ThreadHandle;
#[cfg(target_os = "linux")]
use crate::MAX_PROCESSORS;

// A `CpuSet` allocated for `MAX_PROCESSORS` is handed to the OS as a `cpu_set_t`, so both must
// hold the same number of processors in words of the same alignment.
#[cfg(target_os = "linux")]
const_assert_eq!(libc::CPU_SETSIZE.unsigned_abs(), MAX_PROCESSORS);
#[cfg(target_os = "linux")]
const_assert_eq!(size_of::<libc::cpu_set_t>() * 8, MAX_PROCESSORS as usize);
#[cfg(target_os = "linux")]
const_assert_eq!(align_of::<libc::cpu_set_t>(), align_of::<usize>());

/// Bindings that target the real operating system that the build is targeting.
///
/// All methods use the default implementations of [`MaskBindings`].
#[derive(Debug, Default)]
pub(crate) struct BuildTargetMaskBindings;

impl MaskBindings for BuildTargetMaskBindings {}

// Real OS calls are excluded from coverage measurement because they are exercised by the
// integration tests and their error paths require OS-level failures.
#[cfg(target_os = "linux")]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) fn processor_count() -> u32 {
    // SAFETY: No safety requirements.
    let count = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_CONF) };

    u32::try_from(count)
        .ok()
        .filter(|count| *count > 0)
        .unwrap_or_else(available_parallelism)
}

#[cfg(target_os = "linux")]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) fn current_thread() -> ThreadHandle {
    // SAFETY: No safety requirements.
    let thread = unsafe { libc::pthread_self() };

    #[allow(
        clippy::cast_possible_truncation,
        clippy::unnecessary_cast,
        reason = "pthread_t is an unsigned long, which is pointer-sized on Linux"
    )]
    let thread = thread as usize;

    ThreadHandle::from_raw(thread)
}

#[cfg(target_os = "linux")]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) fn set_thread_affinity(
    thread: ThreadHandle,
    cpu_set: &CpuSet,
    cpu_set_size: usize,
) -> io::Result<()> {
    // Never let the OS read past the end of our allocation.
    let cpu_set_size = cpu_set_size.min(cpu_set.byte_size());

    #[allow(
        clippy::unnecessary_cast,
        reason = "pthread_t is an unsigned long, which is pointer-sized on Linux"
    )]
    let thread = thread.as_raw() as libc::pthread_t;

    // SAFETY: The set is valid for reads of `cpu_set_size` bytes and has the alignment of
    // `unsigned long`, which is the alignment of `cpu_set_t`. Passing a handle of a thread
    // that has exited is the caller's responsibility, as documented on `ThreadHandle`.
    let result = unsafe {
        libc::pthread_setaffinity_np(
            thread,
            cpu_set_size,
            cpu_set.as_words().as_ptr().cast::<libc::cpu_set_t>(),
        )
    };

    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(result))
    }
}

#[cfg(target_os = "linux")]
fn available_parallelism() -> u32 {
    std::thread::available_parallelism()
        .ok()
        .and_then(|count| u32::try_from(count.get()).ok())
        .unwrap_or(1)
}

// Platforms without a native mask-based affinity API can still inspect the processor count but
// every attempt to change affinity reports failure without a native status code.

#[cfg(not(target_os = "linux"))]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) fn processor_count() -> u32 {
    std::thread::available_parallelism()
        .ok()
        .map(NonZero::get)
        .and_then(|count| u32::try_from(count).ok())
        .unwrap_or(1)
}

#[cfg(not(target_os = "linux"))]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) fn current_thread() -> ThreadHandle {
    ThreadHandle::from_raw(0)
}

#[cfg(not(target_os = "linux"))]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) fn set_thread_affinity(
    _thread: ThreadHandle,
    _cpu_set: &CpuSet,
    _cpu_set_size: usize,
) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "thread affinity is not supported on this platform",
    ))
}
