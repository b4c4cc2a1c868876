//! Mask-based affinity, as used by Linux: the whole selection lives in one processor set that is
//! handed to the operating system in a single call.

mod bindings;
mod cpu_set;

use std::mem;
use std::sync::Arc;

pub use bindings::*;
pub use cpu_set::*;
use tracing::{debug, trace};

use crate::pal::{AffinityBackend, AffinityEditor};
use crate::{Error, MAX_PROCESSORS, ProcessorIndex, Result, ThreadHandle};

/// Binds threads to processors via one native processor set per call.
///
/// This is the platform backend on Linux. It can also be constructed on other platforms with
/// custom bindings, which is how its behavior is tested without touching real threads.
#[derive(Debug)]
pub struct MaskBackend {
    bindings: MaskBindingsFacade,
}

impl MaskBackend {
    /// Creates a backend that calls the real operating system.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bindings: MaskBindingsFacade::target(),
        }
    }

    /// Creates a backend that calls the given bindings instead of the real operating system.
    #[must_use]
    pub fn with_bindings(bindings: Arc<dyn MaskBindings>) -> Self {
        Self {
            bindings: MaskBindingsFacade::from_custom(bindings),
        }
    }
}

impl Default for MaskBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AffinityBackend for MaskBackend {
    type Editor<'a> = MaskEditor<'a>;

    fn editor(&self, thread: ThreadHandle) -> Result<Self::Editor<'_>> {
        MaskEditor::new(&self.bindings, thread)
    }

    fn current_thread(&self) -> ThreadHandle {
        self.bindings.current_thread()
    }

    fn count_cores(&self) -> u32 {
        self.bindings.processor_count()
    }
}

/// Accumulates processors in a native processor set and applies it to one thread.
///
/// The processor set is allocated when the editor is created and returned to the bindings when
/// the editor is dropped, whether or not any operation on it failed.
#[derive(Debug)]
pub struct MaskEditor<'a> {
    bindings: &'a MaskBindingsFacade,
    thread: ThreadHandle,
    cpu_set: CpuSet,
}

impl<'a> MaskEditor<'a> {
    fn new(bindings: &'a MaskBindingsFacade, thread: ThreadHandle) -> Result<Self> {
        let mut cpu_set = bindings
            .alloc_cpu_set(MAX_PROCESSORS)
            .ok_or(Error::CpuSetAllocation {
                capacity: MAX_PROCESSORS,
            })?;

        // Custom bindings may hand out a smaller set than requested. Selecting a processor
        // beyond its capacity would silently drop it, so such a set is treated as not allocated.
        if cpu_set.capacity() < MAX_PROCESSORS {
            bindings.free_cpu_set(cpu_set);

            return Err(Error::CpuSetAllocation {
                capacity: MAX_PROCESSORS,
            });
        }

        bindings.zero_cpu_set(&mut cpu_set);

        Ok(Self {
            bindings,
            thread,
            cpu_set,
        })
    }
}

impl AffinityEditor for MaskEditor<'_> {
    fn set(&mut self, processor: ProcessorIndex) -> Result<()> {
        if processor >= MAX_PROCESSORS {
            return Err(Error::ProcessorOutOfRange {
                processor,
                max: MAX_PROCESSORS - 1,
            });
        }

        trace!(thread = %self.thread, processor, "adding processor to pending affinity");
        self.bindings.set_cpu_in_set(processor, &mut self.cpu_set);

        Ok(())
    }

    fn apply(&mut self) -> Result<()> {
        let size = self.bindings.cpu_set_size(&self.cpu_set);

        self.bindings
            .set_thread_affinity(self.thread, &self.cpu_set, size)
            .map_err(|e| Error::os("pthread_setaffinity_np", e))?;

        debug!(
            thread = %self.thread,
            processors = %cpulist::emit(self.cpu_set.iter()),
            "thread affinity applied"
        );

        Ok(())
    }
}

impl Drop for MaskEditor<'_> {
    fn drop(&mut self) {
        let cpu_set = mem::replace(&mut self.cpu_set, CpuSet::empty());
        self.bindings.free_cpu_set(cpu_set);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::pal::MockMaskBindings;
    use crate::pal::fakes::FakeMaskBindings;

    const EINVAL: i32 = 22;

    fn backend(fake: &Arc<FakeMaskBindings>) -> MaskBackend {
        let bindings: Arc<dyn MaskBindings> = Arc::<FakeMaskBindings>::clone(fake);
        MaskBackend::with_bindings(bindings)
    }

    #[test]
    fn count_cores_is_os_processor_count() {
        let fake = Arc::new(FakeMaskBindings::new(12));
        let backend = backend(&fake);

        assert_eq!(backend.count_cores(), 12);

        let mut editor = backend.editor(ThreadHandle::from_raw(1)).unwrap();
        editor.set(3).unwrap();
        editor.apply().unwrap();
        drop(editor);

        assert_eq!(backend.count_cores(), 12);
    }

    #[test]
    fn every_processor_can_be_selected_alone() {
        let fake = Arc::new(FakeMaskBindings::new(8));
        let backend = backend(&fake);
        let thread = ThreadHandle::from_raw(5);

        for processor in 0..backend.count_cores() {
            let mut editor = backend.editor(thread).unwrap();
            editor.set(processor).unwrap();
            editor.apply().unwrap();
            drop(editor);

            assert_eq!(fake.last_applied(), Some((thread, vec![processor])));
        }

        assert_eq!(fake.allocations(), 8);
        assert_eq!(fake.frees(), 8);
    }

    #[test]
    fn apply_is_a_flush() {
        let fake = Arc::new(FakeMaskBindings::new(8));
        let backend = backend(&fake);
        let thread = ThreadHandle::from_raw(5);

        let mut editor = backend.editor(thread).unwrap();
        editor.set(1).unwrap();
        editor.apply().unwrap();
        editor.set(3).unwrap();
        editor.apply().unwrap();
        drop(editor);

        assert_eq!(
            fake.applied(),
            vec![(thread, vec![1]), (thread, vec![1, 3])]
        );
    }

    #[test]
    fn out_of_range_processor_is_rejected_without_os_call() {
        let fake = Arc::new(FakeMaskBindings::new(8));
        let backend = backend(&fake);

        let mut editor = backend.editor(ThreadHandle::from_raw(5)).unwrap();

        let result = editor.set(MAX_PROCESSORS);
        assert!(matches!(
            result,
            Err(Error::ProcessorOutOfRange { processor, max })
                if processor == MAX_PROCESSORS && max == MAX_PROCESSORS - 1
        ));

        drop(editor);

        assert!(fake.applied().is_empty());
        assert_eq!(fake.allocations(), 1);
        assert_eq!(fake.frees(), 1);
    }

    #[test]
    fn allocation_failure_is_error() {
        let fake = Arc::new(FakeMaskBindings::new(8).failing_allocation());
        let backend = backend(&fake);

        let result = backend.editor(ThreadHandle::from_raw(5));
        assert!(matches!(
            result,
            Err(Error::CpuSetAllocation { capacity }) if capacity == MAX_PROCESSORS
        ));

        assert_eq!(fake.frees(), 0);
        assert!(fake.applied().is_empty());
    }

    #[test]
    fn undersized_cpu_set_is_released_and_rejected() {
        let mut bindings = MockMaskBindings::new();
        bindings
            .expect_alloc_cpu_set()
            .times(1)
            .returning(|_| CpuSet::new(64));
        bindings
            .expect_free_cpu_set()
            .withf(|cpu_set| cpu_set.capacity() == 64)
            .times(1)
            .return_const(());
        bindings.expect_zero_cpu_set().never();
        bindings.expect_set_cpu_in_set().never();
        bindings.expect_set_thread_affinity().never();

        let backend = MaskBackend::with_bindings(Arc::new(bindings));

        let result = backend.editor(ThreadHandle::from_raw(5));
        assert!(matches!(
            result,
            Err(Error::CpuSetAllocation { capacity }) if capacity == MAX_PROCESSORS
        ));
    }

    #[test]
    fn os_failure_is_error_and_still_frees() {
        let fake = Arc::new(FakeMaskBindings::new(8).failing_apply(EINVAL));
        let backend = backend(&fake);

        let mut editor = backend.editor(ThreadHandle::from_raw(5)).unwrap();
        editor.set(2).unwrap();

        let result = editor.apply();
        assert!(matches!(
            result,
            Err(Error::Os { status, .. }) if status == EINVAL
        ));

        drop(editor);

        assert_eq!(fake.allocations(), 1);
        assert_eq!(fake.frees(), 1);
    }

    #[test]
    fn editor_selects_full_capacity() {
        let fake = Arc::new(FakeMaskBindings::new(8));
        let backend = backend(&fake);

        let mut editor = backend.editor(ThreadHandle::from_raw(5)).unwrap();
        editor.set(MAX_PROCESSORS - 1).unwrap();
        editor.apply().unwrap();

        assert_eq!(
            fake.last_applied().map(|(_, processors)| processors),
            Some(vec![MAX_PROCESSORS - 1])
        );
        assert_eq!(fake.last_applied_size(), Some(128));
    }
}
