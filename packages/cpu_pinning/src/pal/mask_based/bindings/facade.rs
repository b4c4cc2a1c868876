#![cfg_attr(coverage_nightly, coverage(off))]

use std::fmt::Debug;
use std::io;
use std::sync::Arc;

use crate::pal::mask_based::{BuildTargetMaskBindings, CpuSet, MaskBindings};
use crate::{ProcessorIndex, ThreadHandle};

/// Hides the real/custom bindings choice behind a single type.
#[derive(Clone)]
pub(crate) enum MaskBindingsFacade {
    Target(&'static BuildTargetMaskBindings),
    Custom(Arc<dyn MaskBindings>),
}

impl MaskBindingsFacade {
    pub(crate) const fn target() -> Self {
        Self::Target(&BuildTargetMaskBindings)
    }

    pub(crate) fn from_custom(bindings: Arc<dyn MaskBindings>) -> Self {
        Self::Custom(bindings)
    }
}

impl MaskBindings for MaskBindingsFacade {
    fn processor_count(&self) -> u32 {
        match self {
            Self::Target(bindings) => bindings.processor_count(),
            Self::Custom(bindings) => bindings.processor_count(),
        }
    }

    fn alloc_cpu_set(&self, capacity: ProcessorIndex) -> Option<CpuSet> {
        match self {
            Self::Target(bindings) => bindings.alloc_cpu_set(capacity),
            Self::Custom(bindings) => bindings.alloc_cpu_set(capacity),
        }
    }

    fn free_cpu_set(&self, cpu_set: CpuSet) {
        match self {
            Self::Target(bindings) => bindings.free_cpu_set(cpu_set),
            Self::Custom(bindings) => bindings.free_cpu_set(cpu_set),
        }
    }

    fn cpu_set_size(&self, cpu_set: &CpuSet) -> usize {
        match self {
            Self::Target(bindings) => bindings.cpu_set_size(cpu_set),
            Self::Custom(bindings) => bindings.cpu_set_size(cpu_set),
        }
    }

    fn zero_cpu_set(&self, cpu_set: &mut CpuSet) {
        match self {
            Self::Target(bindings) => bindings.zero_cpu_set(cpu_set),
            Self::Custom(bindings) => bindings.zero_cpu_set(cpu_set),
        }
    }

    fn set_cpu_in_set(&self, processor: ProcessorIndex, cpu_set: &mut CpuSet) {
        match self {
            Self::Target(bindings) => bindings.set_cpu_in_set(processor, cpu_set),
            Self::Custom(bindings) => bindings.set_cpu_in_set(processor, cpu_set),
        }
    }

    fn current_thread(&self) -> ThreadHandle {
        match self {
            Self::Target(bindings) => bindings.current_thread(),
            Self::Custom(bindings) => bindings.current_thread(),
        }
    }

    fn set_thread_affinity(
        &self,
        thread: ThreadHandle,
        cpu_set: &CpuSet,
        cpu_set_size: usize,
    ) -> io::Result<()> {
        match self {
            Self::Target(bindings) => bindings.set_thread_affinity(thread, cpu_set, cpu_set_size),
            Self::Custom(bindings) => bindings.set_thread_affinity(thread, cpu_set, cpu_set_size),
        }
    }
}

impl Debug for MaskBindingsFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(inner) => inner.fmt(f),
            Self::Custom(inner) => inner.fmt(f),
        }
    }
}
