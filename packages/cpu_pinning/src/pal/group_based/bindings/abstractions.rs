use std::fmt::Debug;
use std::io;

use crate::ThreadHandle;

/// Win32 error code reported when a caller-provided buffer is too small.
pub const ERROR_INSUFFICIENT_BUFFER: i32 = 122;

/// Affinity of a thread within one processor group, mirroring the native `GROUP_AFFINITY`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_structs,
    reason = "mirrors a native structure that will not change"
)]
pub struct GroupAffinity {
    /// Bit `i` selects the processor with in-group index `i`.
    pub mask: usize,

    /// The processor group the mask applies to.
    pub group: u16,
}

/// Operating system capabilities used by the processor-group-based (Windows-style) backend.
///
/// Every method reports failure through its return value; the error carries the native status
/// code when one is available.
#[cfg_attr(test, mockall::automock)]
pub trait GroupBindings: Debug + Send + Sync + 'static {
    /// Fills `buffer` with `SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX` records for the
    /// `RelationGroup` relationship (`GetLogicalProcessorInformationEx()`).
    ///
    /// If the buffer is too small, fails with [`ERROR_INSUFFICIENT_BUFFER`] as the raw OS error
    /// and stores the required size in `returned_length`. On success, `returned_length` is the
    /// number of bytes written.
    fn get_logical_processor_group_information(
        &self,
        buffer: &mut [u8],
        returned_length: &mut u32,
    ) -> io::Result<()>;

    /// Restricts a thread to the processors of one group (`SetThreadGroupAffinity()`).
    fn set_thread_group_affinity(
        &self,
        thread: ThreadHandle,
        affinity: &GroupAffinity,
    ) -> io::Result<()>;

    /// The native handle of the calling thread (`GetCurrentThread()`).
    fn current_thread(&self) -> ThreadHandle;
}
