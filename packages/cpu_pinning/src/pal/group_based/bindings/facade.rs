#![cfg_attr(coverage_nightly, coverage(off))]

use std::fmt::Debug;
use std::io;
use std::sync::Arc;

#[cfg(windows)]
use crate::pal::group_based::BuildTargetGroupBindings;
use crate::pal::group_based::{GroupAffinity, GroupBindings};
use crate::ThreadHandle;

/// Hides the real/custom bindings choice behind a single type.
///
/// Real bindings only exist when building for Windows; elsewhere the group-based backend can
/// only be driven by custom bindings.
#[derive(Clone)]
pub(crate) enum GroupBindingsFacade {
    #[cfg(windows)]
    Target(&'static BuildTargetGroupBindings),

    Custom(Arc<dyn GroupBindings>),
}

impl GroupBindingsFacade {
    #[cfg(windows)]
    pub(crate) const fn target() -> Self {
        Self::Target(&BuildTargetGroupBindings)
    }

    pub(crate) fn from_custom(bindings: Arc<dyn GroupBindings>) -> Self {
        Self::Custom(bindings)
    }
}

impl GroupBindings for GroupBindingsFacade {
    fn get_logical_processor_group_information(
        &self,
        buffer: &mut [u8],
        returned_length: &mut u32,
    ) -> io::Result<()> {
        match self {
            #[cfg(windows)]
            Self::Target(bindings) => {
                bindings.get_logical_processor_group_information(buffer, returned_length)
            }
            Self::Custom(bindings) => {
                bindings.get_logical_processor_group_information(buffer, returned_length)
            }
        }
    }

    fn set_thread_group_affinity(
        &self,
        thread: ThreadHandle,
        affinity: &GroupAffinity,
    ) -> io::Result<()> {
        match self {
            #[cfg(windows)]
            Self::Target(bindings) => bindings.set_thread_group_affinity(thread, affinity),
            Self::Custom(bindings) => bindings.set_thread_group_affinity(thread, affinity),
        }
    }

    fn current_thread(&self) -> ThreadHandle {
        match self {
            #[cfg(windows)]
            Self::Target(bindings) => bindings.current_thread(),
            Self::Custom(bindings) => bindings.current_thread(),
        }
    }
}

impl Debug for GroupBindingsFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(windows)]
            Self::Target(inner) => inner.fmt(f),
            Self::Custom(inner) => inner.fmt(f),
        }
    }
}
