use std::fmt::{self, Display};
use std::str::FromStr;

use crate::{Error, MAX_PROCESSORS, ProcessorIndex, Result};

const WORD_BITS: ProcessorIndex = u64::BITS;

/// Number of 64-bit words backing a [`CpuMask`].
pub const CPU_MASK_WORDS: usize = (MAX_PROCESSORS / WORD_BITS) as usize;

/// A set of logical processors, stored as a fixed-capacity bit-vector.
///
/// Bit `i` being set means "logical processor `i` is included". The capacity is
/// [`MAX_PROCESSORS`](crate::MAX_PROCESSORS) regardless of the platform, so a mask can be built
/// once and applied on any operating system.
///
/// # Example
///
/// ```
/// use cpu_pinning::CpuMask;
///
/// let mask: CpuMask = "0-3,8".parse().unwrap();
///
/// assert_eq!(mask.len(), 5);
/// assert!(mask.contains(8));
///
/// println!("Selected processors: {mask}");
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CpuMask {
    words: [u64; CPU_MASK_WORDS],
}

impl CpuMask {
    /// Creates a mask with no processors selected.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [0; CPU_MASK_WORDS],
        }
    }

    /// Creates a mask that selects exactly one processor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessorOutOfRange`] if the index is not below `MAX_PROCESSORS`.
    pub fn from_processor(processor: ProcessorIndex) -> Result<Self> {
        let mut mask = Self::new();
        mask.insert(processor)?;
        Ok(mask)
    }

    /// Creates a mask that selects every processor yielded by the iterator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessorOutOfRange`] for the first index that is not below
    /// `MAX_PROCESSORS`.
    pub fn from_processors<I>(processors: I) -> Result<Self>
    where
        I: IntoIterator<Item = ProcessorIndex>,
    {
        let mut mask = Self::new();

        for processor in processors {
            mask.insert(processor)?;
        }

        Ok(mask)
    }

    /// Parses a mask from a Linux-style cpulist string such as `0-3,8,10-16:2`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCpulist`] if the syntax is invalid and
    /// [`Error::ProcessorOutOfRange`] if any listed processor is not below `MAX_PROCESSORS`.
    pub fn from_cpulist(cpulist: &str) -> Result<Self> {
        Self::from_processors(cpulist::parse(cpulist)?)
    }

    /// Adds a processor to the mask. Adding an already selected processor is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessorOutOfRange`] if the index is not below `MAX_PROCESSORS`.
    pub fn insert(&mut self, processor: ProcessorIndex) -> Result<()> {
        let (word, bit) = Self::locate(processor)?;

        // Cannot be out of bounds, `locate()` checked the range.
        if let Some(word) = self.words.get_mut(word) {
            *word |= bit;
        }

        Ok(())
    }

    /// Removes a processor from the mask, returning whether it was selected.
    pub fn remove(&mut self, processor: ProcessorIndex) -> bool {
        let Ok((word, bit)) = Self::locate(processor) else {
            return false;
        };

        match self.words.get_mut(word) {
            Some(word) if *word & bit != 0 => {
                *word &= !bit;
                true
            }
            _ => false,
        }
    }

    /// Whether the processor is selected. Out of range indexes are never selected.
    #[must_use]
    pub fn contains(&self, processor: ProcessorIndex) -> bool {
        Self::locate(processor)
            .ok()
            .and_then(|(word, bit)| self.words.get(word).map(|w| w & bit != 0))
            .unwrap_or(false)
    }

    /// Number of selected processors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Whether no processor is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// The raw backing words. Word `n` holds processors `n * 64` to `n * 64 + 63`.
    #[must_use]
    pub const fn words(&self) -> &[u64; CPU_MASK_WORDS] {
        &self.words
    }

    /// Iterates over the selected processors in increasing index order.
    ///
    /// All-zero words are skipped without inspecting their individual bits.
    pub fn iter(&self) -> impl Iterator<Item = ProcessorIndex> + '_ {
        self.words
            .iter()
            .zip(0..)
            .filter(|(word, _)| **word != 0)
            .flat_map(|(word, word_index)| {
                SetBits(*word).map(move |bit| word_index * WORD_BITS + bit)
            })
    }

    fn locate(processor: ProcessorIndex) -> Result<(usize, u64)> {
        if processor >= MAX_PROCESSORS {
            return Err(Error::ProcessorOutOfRange {
                processor,
                max: MAX_PROCESSORS - 1,
            });
        }

        Ok((
            (processor / WORD_BITS) as usize,
            1 << (processor % WORD_BITS),
        ))
    }
}

impl Default for CpuMask {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for CpuMask {
    /// Creates a mask from a bitmask of the first 64 processors.
    fn from(value: u64) -> Self {
        let mut mask = Self::new();
        mask.words[0] = value;
        mask
    }
}

impl FromStr for CpuMask {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_cpulist(s)
    }
}

impl Display for CpuMask {
    /// Formats the mask as a cpulist string, e.g. `0-3,8`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&cpulist::emit(self.iter()))
    }
}

/// Yields the positions of the set bits of a word, lowest first.
#[derive(Debug)]
struct SetBits(u64);

impl Iterator for SetBits {
    type Item = ProcessorIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0 == 0 {
            return None;
        }

        let bit = self.0.trailing_zeros();
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn new_is_empty() {
        let mask = CpuMask::new();

        assert!(mask.is_empty());
        assert_eq!(mask.len(), 0);
        assert_eq!(mask.iter().count(), 0);
        assert_eq!(mask, CpuMask::default());
    }

    #[test]
    fn insert_contains_remove() {
        let mut mask = CpuMask::new();

        mask.insert(0).unwrap();
        mask.insert(63).unwrap();
        mask.insert(64).unwrap();
        mask.insert(MAX_PROCESSORS - 1).unwrap();

        assert_eq!(mask.len(), 4);
        assert!(mask.contains(0));
        assert!(mask.contains(63));
        assert!(mask.contains(64));
        assert!(mask.contains(MAX_PROCESSORS - 1));
        assert!(!mask.contains(1));

        assert!(mask.remove(63));
        assert!(!mask.remove(63));
        assert!(!mask.contains(63));
        assert_eq!(mask.len(), 3);
    }

    #[test]
    fn out_of_range_is_rejected() {
        let mut mask = CpuMask::new();

        let result = mask.insert(MAX_PROCESSORS);
        assert!(matches!(
            result,
            Err(Error::ProcessorOutOfRange { processor, .. }) if processor == MAX_PROCESSORS
        ));
        assert!(mask.is_empty());

        assert!(!mask.contains(MAX_PROCESSORS));
        assert!(!mask.remove(MAX_PROCESSORS));
        assert!(CpuMask::from_processor(u32::MAX).is_err());
    }

    #[test]
    fn iter_is_increasing_across_words() {
        let mask = CpuMask::from_processors([700, 3, 64, 1, 128, 65]).unwrap();

        let processors: Vec<_> = mask.iter().collect();
        assert_eq!(processors, vec![1, 3, 64, 65, 128, 700]);
    }

    #[test]
    fn from_u64_uses_low_processors() {
        let mask = CpuMask::from(0b0101);

        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(mask.words()[0], 0b0101);
        assert!(mask.words()[1..].iter().all(|w| *w == 0));
    }

    #[test]
    fn cpulist_parse_and_display() {
        let mask = CpuMask::from_cpulist("0-3,8,10-14:2").unwrap();

        assert_eq!(
            mask.iter().collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 8, 10, 12, 14]
        );

        let parsed: CpuMask = mask.to_string().parse().unwrap();
        assert_eq!(parsed, mask);
    }

    #[test]
    fn cpulist_errors() {
        assert!(matches!(
            CpuMask::from_cpulist("0-x"),
            Err(Error::InvalidCpulist(_))
        ));
        assert!(matches!(
            CpuMask::from_cpulist("1020-1030"),
            Err(Error::ProcessorOutOfRange { processor: 1024, .. })
        ));
    }

    #[test]
    fn empty_cpulist_is_empty_mask() {
        assert!(CpuMask::from_cpulist("").unwrap().is_empty());
    }
}
