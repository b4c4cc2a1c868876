use std::fmt::Debug;
use std::io;

use super::real;
use crate::pal::mask_based::CpuSet;
use crate::{ProcessorIndex, ThreadHandle};

/// Operating system capabilities used by the mask-based (Linux-style) affinity backend.
///
/// Every method has a default implementation that calls the real operating system, so a custom
/// implementation only needs to override the calls it wants to observe or replace. No method
/// panics; failures are reported through the return value.
#[cfg_attr(test, mockall::automock)]
pub trait MaskBindings: Debug + Send + Sync + 'static {
    /// Number of processors configured in the system.
    fn processor_count(&self) -> u32 {
        real::processor_count()
    }

    /// Allocates a zeroed processor set with room for `capacity` processors, `None` on failure.
    fn alloc_cpu_set(&self, capacity: ProcessorIndex) -> Option<CpuSet> {
        CpuSet::new(capacity)
    }

    /// Releases a processor set obtained from [`alloc_cpu_set()`][Self::alloc_cpu_set].
    fn free_cpu_set(&self, cpu_set: CpuSet) {
        drop(cpu_set);
    }

    /// Size of the processor set in bytes (`CPU_ALLOC_SIZE`).
    fn cpu_set_size(&self, cpu_set: &CpuSet) -> usize {
        cpu_set.byte_size()
    }

    /// Deselects every processor in the set (`CPU_ZERO_S`).
    fn zero_cpu_set(&self, cpu_set: &mut CpuSet) {
        cpu_set.clear();
    }

    /// Selects one processor in the set (`CPU_SET_S`).
    ///
    /// The backend only calls this for processors below [`MAX_PROCESSORS`][crate::MAX_PROCESSORS]
    /// and rejects sets from [`alloc_cpu_set()`][Self::alloc_cpu_set] that cannot hold that many,
    /// so the processor always fits.
    fn set_cpu_in_set(&self, processor: ProcessorIndex, cpu_set: &mut CpuSet) {
        cpu_set.insert(processor);
    }

    /// The native handle of the calling thread (`pthread_self()`).
    fn current_thread(&self) -> ThreadHandle {
        real::current_thread()
    }

    /// Restricts a thread to the processors selected in the first `cpu_set_size` bytes of the
    /// set (`pthread_setaffinity_np()`).
    ///
    /// The error carries the native error number when one is available.
    fn set_thread_affinity(
        &self,
        thread: ThreadHandle,
        cpu_set: &CpuSet,
        cpu_set_size: usize,
    ) -> io::Result<()> {
        real::set_thread_affinity(thread, cpu_set, cpu_set_size)
    }
}
