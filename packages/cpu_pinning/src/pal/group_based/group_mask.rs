use crate::pal::group_based::{GroupAffinity, ProcessorGroupIndex, ProcessorIndexInGroup};

/// Collects processors from the same group into a native affinity mask.
#[derive(Debug)]
pub(crate) struct GroupMask {
    // The native affinity word is pointer-sized. Processor groups never exceed 64 processors,
    // so on 32-bit Windows only the first 32 processors of a group are reachable.
    mask: usize,

    // If set, must match - adding processors from different groups to the same mask is nonsense.
    group: Option<ProcessorGroupIndex>,
}

impl GroupMask {
    /// Creates a new mask with all bits cleared and no group assigned.
    pub(crate) const fn none() -> Self {
        Self {
            mask: 0,
            group: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.mask == 0
    }

    /// The native affinity for the accumulated processors, or `None` if nothing was added.
    pub(crate) fn to_affinity(&self) -> Option<GroupAffinity> {
        let group = self.group?;

        (!self.is_empty()).then_some(GroupAffinity {
            mask: self.mask,
            group,
        })
    }

    #[cfg_attr(test, mutants::skip)] // False positive due to no-op mutation from | to ^.
    pub(crate) fn add(&mut self, group: ProcessorGroupIndex, index_in_group: ProcessorIndexInGroup) {
        if let Some(existing) = self.group {
            assert_eq!(
                existing, group,
                "adding processors from different groups to the same mask is nonsense"
            );
        } else {
            self.group = Some(group);
        }

        self.mask |= 1 << usize::from(index_in_group);
    }

    /// Forgets the accumulated processors so the mask can be reused for another group.
    pub(crate) fn clear(&mut self) {
        *self = Self::none();
    }
}
