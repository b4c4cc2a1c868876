use std::fmt::{self, Debug};

use crate::ProcessorIndex;

const WORD_BITS: ProcessorIndex = usize::BITS;

/// A dynamically sized processor set in the native Linux `cpu_set_t` layout.
///
/// The set is an array of `unsigned long` words where bit `i` selects processor `i`. Unlike the
/// fixed-size `cpu_set_t`, the capacity is chosen at allocation time, matching what `CPU_ALLOC()`
/// does in C.
pub struct CpuSet {
    words: Box<[usize]>,
}

impl CpuSet {
    /// Allocates a zeroed set with room for `capacity` processors.
    ///
    /// Returns `None` if the memory cannot be allocated.
    #[must_use]
    pub fn new(capacity: ProcessorIndex) -> Option<Self> {
        let word_count = capacity.div_ceil(WORD_BITS) as usize;

        let mut words = Vec::new();
        words.try_reserve_exact(word_count).ok()?;
        words.resize(word_count, 0);

        Some(Self {
            words: words.into_boxed_slice(),
        })
    }

    /// A set with no capacity, used as a placeholder once the real set has been released.
    pub(crate) fn empty() -> Self {
        Self {
            words: Box::default(),
        }
    }

    /// Size of the set in bytes, as expected by `pthread_setaffinity_np()`.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        size_of_val(&*self.words)
    }

    /// Number of processors the set can hold.
    #[must_use]
    pub fn capacity(&self) -> ProcessorIndex {
        ProcessorIndex::try_from(self.words.len())
            .unwrap_or(ProcessorIndex::MAX)
            .saturating_mul(WORD_BITS)
    }

    /// Deselects all processors.
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Selects a processor, returning `false` if it is beyond the capacity of the set.
    pub fn insert(&mut self, processor: ProcessorIndex) -> bool {
        match self.words.get_mut((processor / WORD_BITS) as usize) {
            Some(word) => {
                *word |= 1 << (processor % WORD_BITS);
                true
            }
            None => false,
        }
    }

    /// Whether the processor is selected.
    #[must_use]
    pub fn contains(&self, processor: ProcessorIndex) -> bool {
        self.words
            .get((processor / WORD_BITS) as usize)
            .is_some_and(|word| word & (1 << (processor % WORD_BITS)) != 0)
    }

    /// Iterates over the selected processors in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = ProcessorIndex> + '_ {
        (0..self.capacity()).filter(|p| self.contains(*p))
    }

    /// The native words of the set, ready to be handed to the operating system.
    #[must_use]
    pub fn as_words(&self) -> &[usize] {
        &self.words
    }
}

impl Debug for CpuSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuSet")
            .field("capacity", &self.capacity())
            .field("selected", &cpulist::emit(self.iter()))
            .finish()
    }
}
