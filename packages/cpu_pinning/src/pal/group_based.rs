//! Processor-group-based affinity, as used by Windows.
//!
//! Native affinity masks are only pointer-sized, so systems with more logical processors are
//! partitioned into processor groups and a thread can only be bound to processors of one group
//! per native call. A global processor index must be translated into a (group, in-group bit) pair,
//! skipping any inactive positions in the group.

mod bindings;
mod group_database;
mod group_mask;

use std::sync::Arc;

pub use bindings::*;
pub(crate) use group_database::GroupDatabase;
pub use group_database::{ProcessorGroup, encode_group_topology};
pub(crate) use group_mask::*;
use tracing::{debug, trace};

use crate::pal::{AffinityBackend, AffinityEditor};
use crate::{Error, ProcessorIndex, Result, ThreadHandle};

type ProcessorGroupIndex = u16;
type ProcessorIndexInGroup = u8;

/// Binds threads to processors one processor group at a time.
///
/// The processor group topology is queried once, when the backend is created, and reused by
/// every later call. This is the platform backend on Windows. It can also be constructed on other
/// platforms with custom bindings, which is how its behavior is tested without touching real
/// threads.
#[derive(Debug)]
pub struct GroupBackend {
    bindings: GroupBindingsFacade,
    database: GroupDatabase,
}

impl GroupBackend {
    /// Creates a backend that calls the real operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the processor group topology cannot be queried.
    #[cfg(windows)]
    pub fn new() -> Result<Self> {
        Self::from_facade(GroupBindingsFacade::target())
    }

    /// Creates a backend that calls the given bindings instead of the real operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the processor group topology cannot be queried via the bindings.
    pub fn with_bindings(bindings: Arc<dyn GroupBindings>) -> Result<Self> {
        Self::from_facade(GroupBindingsFacade::from_custom(bindings))
    }

    fn from_facade(bindings: GroupBindingsFacade) -> Result<Self> {
        let database = GroupDatabase::query(&bindings)?;

        debug!(
            groups = database.groups().len(),
            processors = database.processor_count(),
            "processor group topology loaded"
        );

        Ok(Self { bindings, database })
    }
}

impl AffinityBackend for GroupBackend {
    type Editor<'a> = GroupEditor<'a>;

    fn editor(&self, thread: ThreadHandle) -> Result<Self::Editor<'_>> {
        Ok(GroupEditor::new(
            &self.bindings,
            self.database.groups(),
            thread,
        ))
    }

    fn current_thread(&self) -> ThreadHandle {
        self.bindings.current_thread()
    }

    fn count_cores(&self) -> u32 {
        self.database.processor_count()
    }
}

/// Accumulates processors of one processor group at a time and applies them to one thread.
///
/// Processors must be supplied in non-decreasing order. When a processor from a later group
/// arrives, the mask pending for the current group is applied before switching groups. As a
/// thread can only be bound to one group at a time, the last group applied wins.
#[derive(Debug)]
pub struct GroupEditor<'a> {
    bindings: &'a GroupBindingsFacade,
    groups: &'a [ProcessorGroup],
    thread: ThreadHandle,

    // Index into `groups` of the group we are currently accumulating processors for.
    group_index: usize,

    // Global index of the first processor in the current group.
    group_start: ProcessorIndex,

    pending: GroupMask,
}

impl<'a> GroupEditor<'a> {
    fn new(
        bindings: &'a GroupBindingsFacade,
        groups: &'a [ProcessorGroup],
        thread: ThreadHandle,
    ) -> Self {
        Self {
            bindings,
            groups,
            thread,
            group_index: 0,
            group_start: 0,
            pending: GroupMask::none(),
        }
    }

    fn current_group(&self) -> Option<&'a ProcessorGroup> {
        self.groups.get(self.group_index)
    }

    fn current_group_contains(&self, processor: ProcessorIndex) -> bool {
        self.current_group().is_some_and(|group| {
            processor >= self.group_start
                && processor - self.group_start < u32::from(group.active_processor_count)
        })
    }

    /// Ensures the current group is the one that owns `processor`, flushing any pending mask of
    /// the previous group first.
    fn determine_group(&mut self, processor: ProcessorIndex) -> Result<()> {
        if processor < self.group_start {
            return Err(Error::OrderViolation {
                processor,
                group_start: self.group_start,
            });
        }

        if self.current_group_contains(processor) {
            return Ok(());
        }

        if !self.pending.is_empty() {
            self.apply()?;
            self.pending.clear();
        }

        self.find_group(processor)
    }

    /// Advances through the groups until reaching the one that owns `processor`.
    fn find_group(&mut self, processor: ProcessorIndex) -> Result<()> {
        loop {
            let group = self
                .current_group()
                .ok_or(Error::ProcessorNotFound { processor })?;

            let group_end = self.group_start + u32::from(group.active_processor_count);

            if processor < group_end {
                trace!(
                    processor,
                    group = self.group_index,
                    group_start = self.group_start,
                    "found processor group"
                );
                return Ok(());
            }

            self.group_start = group_end;
            self.group_index += 1;
        }
    }

    /// Adds the in-group bit of `processor` to the pending mask, skipping inactive positions.
    fn set_ingroup_affinity(&mut self, processor: ProcessorIndex) -> Result<()> {
        let group = self
            .current_group()
            .ok_or(Error::ProcessorNotFound { processor })?;

        // How many active processors precede this one within the group.
        let active_before = (processor - self.group_start) as usize;

        let index_in_group = (0..usize::BITS)
            .filter(|bit| group.active_processor_mask & (1 << bit) != 0)
            .nth(active_before)
            .and_then(|bit| ProcessorIndexInGroup::try_from(bit).ok())
            .ok_or(Error::ProcessorNotFound { processor })?;

        let group_index = ProcessorGroupIndex::try_from(self.group_index)
            .ok()
            .ok_or(Error::ProcessorNotFound { processor })?;

        self.pending.add(group_index, index_in_group);

        Ok(())
    }
}

impl AffinityEditor for GroupEditor<'_> {
    fn set(&mut self, processor: ProcessorIndex) -> Result<()> {
        self.determine_group(processor)?;
        self.set_ingroup_affinity(processor)
    }

    fn apply(&mut self) -> Result<()> {
        let affinity = self.pending.to_affinity().ok_or(Error::EmptyMask)?;

        self.bindings
            .set_thread_group_affinity(self.thread, &affinity)
            .map_err(|e| Error::os("SetThreadGroupAffinity", e))?;

        debug!(
            thread = %self.thread,
            group = affinity.group,
            mask = affinity.mask,
            "thread group affinity applied"
        );

        Ok(())
    }
}
