//! Recording fakes of the binding traits, for unit tests that need to inspect what the backends
//! asked of the operating system.

use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::pal::{
    CpuSet, ERROR_INSUFFICIENT_BUFFER, GroupAffinity, GroupBindings, MaskBindings, ProcessorGroup,
    encode_group_topology,
};
use crate::{ProcessorIndex, ThreadHandle};

/// The handle both fakes report for the calling thread.
pub(crate) const FAKE_CURRENT_THREAD: ThreadHandle = ThreadHandle::from_raw(0xC0FFEE);

type AppliedMask = (ThreadHandle, Vec<ProcessorIndex>, usize);

#[derive(Debug)]
pub(crate) struct FakeMaskBindings {
    processor_count: u32,
    fail_allocation: bool,
    fail_apply: Option<i32>,

    allocations: AtomicUsize,
    frees: AtomicUsize,
    applied: Mutex<Vec<AppliedMask>>,
}

impl FakeMaskBindings {
    pub(crate) fn new(processor_count: u32) -> Self {
        Self {
            processor_count,
            fail_allocation: false,
            fail_apply: None,
            allocations: AtomicUsize::new(0),
            frees: AtomicUsize::new(0),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_allocation(mut self) -> Self {
        self.fail_allocation = true;
        self
    }

    pub(crate) fn failing_apply(mut self, errno: i32) -> Self {
        self.fail_apply = Some(errno);
        self
    }

    pub(crate) fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    pub(crate) fn frees(&self) -> usize {
        self.frees.load(Ordering::Relaxed)
    }

    /// Every successful affinity change so far, as (thread, selected processors).
    pub(crate) fn applied(&self) -> Vec<(ThreadHandle, Vec<ProcessorIndex>)> {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .map(|(thread, processors, _)| (*thread, processors.clone()))
            .collect()
    }

    pub(crate) fn last_applied(&self) -> Option<(ThreadHandle, Vec<ProcessorIndex>)> {
        self.applied().pop()
    }

    pub(crate) fn last_applied_size(&self) -> Option<usize> {
        self.applied.lock().unwrap().last().map(|(_, _, size)| *size)
    }
}

impl MaskBindings for FakeMaskBindings {
    fn processor_count(&self) -> u32 {
        self.processor_count
    }

    fn alloc_cpu_set(&self, capacity: ProcessorIndex) -> Option<CpuSet> {
        if self.fail_allocation {
            return None;
        }

        self.allocations.fetch_add(1, Ordering::Relaxed);
        CpuSet::new(capacity)
    }

    fn free_cpu_set(&self, cpu_set: CpuSet) {
        self.frees.fetch_add(1, Ordering::Relaxed);
        drop(cpu_set);
    }

    fn current_thread(&self) -> ThreadHandle {
        FAKE_CURRENT_THREAD
    }

    fn set_thread_affinity(
        &self,
        thread: ThreadHandle,
        cpu_set: &CpuSet,
        cpu_set_size: usize,
    ) -> io::Result<()> {
        if let Some(errno) = self.fail_apply {
            return Err(io::Error::from_raw_os_error(errno));
        }

        self.applied
            .lock()
            .unwrap()
            .push((thread, cpu_set.iter().collect(), cpu_set_size));

        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct FakeGroupBindings {
    topology: Vec<u8>,
    fail_fill: Option<i32>,
    fail_apply: Option<i32>,

    queries: AtomicUsize,
    applied: Mutex<Vec<(ThreadHandle, GroupAffinity)>>,
}

impl FakeGroupBindings {
    pub(crate) fn new(groups: &[ProcessorGroup]) -> Self {
        Self {
            topology: encode_group_topology(groups).unwrap(),
            fail_fill: None,
            fail_apply: None,
            queries: AtomicUsize::new(0),
            applied: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_fill(mut self, status: i32) -> Self {
        self.fail_fill = Some(status);
        self
    }

    pub(crate) fn failing_apply(mut self, status: i32) -> Self {
        self.fail_apply = Some(status);
        self
    }

    pub(crate) fn queries(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    /// Every successful group affinity change so far, in call order.
    pub(crate) fn applied(&self) -> Vec<(ThreadHandle, GroupAffinity)> {
        self.applied.lock().unwrap().clone()
    }
}

impl GroupBindings for FakeGroupBindings {
    fn get_logical_processor_group_information(
        &self,
        buffer: &mut [u8],
        returned_length: &mut u32,
    ) -> io::Result<()> {
        self.queries.fetch_add(1, Ordering::Relaxed);

        *returned_length = u32::try_from(self.topology.len()).unwrap();

        if buffer.len() < self.topology.len() {
            return Err(io::Error::from_raw_os_error(ERROR_INSUFFICIENT_BUFFER));
        }

        if let Some(status) = self.fail_fill {
            return Err(io::Error::from_raw_os_error(status));
        }

        buffer[..self.topology.len()].copy_from_slice(&self.topology);
        Ok(())
    }

    fn set_thread_group_affinity(
        &self,
        thread: ThreadHandle,
        affinity: &GroupAffinity,
    ) -> io::Result<()> {
        if let Some(status) = self.fail_apply {
            return Err(io::Error::from_raw_os_error(status));
        }

        self.applied.lock().unwrap().push((thread, *affinity));
        Ok(())
    }

    fn current_thread(&self) -> ThreadHandle {
        FAKE_CURRENT_THREAD
    }
}
