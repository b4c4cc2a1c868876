/// Identifies a logical processor.
///
/// Indexes are global across the whole system: they start from zero and are contiguous even on
/// systems where the operating system partitions processors into multiple processor groups.
pub type ProcessorIndex = u32;

/// The maximum number of logical processors supported by this package.
///
/// Processor indexes at or beyond this value are rejected by every operation, on every platform.
pub const MAX_PROCESSORS: ProcessorIndex = 1024;
