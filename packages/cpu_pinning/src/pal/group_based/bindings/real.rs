use std::ffi::c_void;
use std::io;
use std::ptr;

use windows::Win32::Foundation::HANDLE;
use windows::Win32::System::SystemInformation::{
    GROUP_AFFINITY, GetLogicalProcessorInformationEx, RelationGroup,
    SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX,
};
use windows::Win32::System::Threading::{GetCurrentThread, SetThreadGroupAffinity};

use crate::ThreadHandle;
use crate::pal::group_based::{GroupAffinity, GroupBindings};

/// Bindings that call the real Windows API.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetGroupBindings;

// Real OS bindings are excluded from coverage measurement because error paths require OS-level
// failures that are impractical to trigger in tests.
#[cfg_attr(coverage_nightly, coverage(off))]
impl GroupBindings for BuildTargetGroupBindings {
    fn get_logical_processor_group_information(
        &self,
        buffer: &mut [u8],
        returned_length: &mut u32,
    ) -> io::Result<()> {
        // The records contain pointer-sized fields, so the operating system expects the buffer to
        // be suitably aligned. We fill an aligned scratch buffer and copy the bytes out.
        let mut scratch = vec![0_u64; buffer.len().div_ceil(size_of::<u64>())];
        let mut length = u32::try_from(buffer.len()).map_err(io::Error::other)?;

        let scratch_ptr = if buffer.is_empty() {
            None
        } else {
            Some(
                scratch
                    .as_mut_ptr()
                    .cast::<SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX>(),
            )
        };

        // SAFETY: The scratch buffer is valid for writes of `length` bytes and 8-byte aligned.
        let result = unsafe {
            GetLogicalProcessorInformationEx(RelationGroup, scratch_ptr, &raw mut length)
        };

        *returned_length = length;
        result.map_err(|e| to_io_error(&e))?;

        for (target, source) in buffer.chunks_mut(size_of::<u64>()).zip(&scratch) {
            let bytes = source.to_ne_bytes();
            target.copy_from_slice(bytes.get(..target.len()).unwrap_or(&bytes));
        }

        Ok(())
    }

    fn set_thread_group_affinity(
        &self,
        thread: ThreadHandle,
        affinity: &GroupAffinity,
    ) -> io::Result<()> {
        let native = GROUP_AFFINITY {
            Mask: affinity.mask,
            Group: affinity.group,
            Reserved: [0; 3],
        };

        let thread = HANDLE(ptr::with_exposed_provenance_mut::<c_void>(thread.as_raw()));

        // SAFETY: The affinity structure lives for the duration of the call. Passing a handle of
        // a thread that has exited is the caller's responsibility, as documented on
        // `ThreadHandle`.
        unsafe { SetThreadGroupAffinity(thread, &raw const native, None) }
            .map_err(|e| to_io_error(&e))
    }

    fn current_thread(&self) -> ThreadHandle {
        // SAFETY: No safety requirements. The result is a pseudo-handle that always refers to
        // the calling thread and does not need to be closed.
        let thread = unsafe { GetCurrentThread() };

        ThreadHandle::from_raw(thread.0.expose_provenance())
    }
}

/// Converts a Windows error into an I/O error carrying the Win32 error code, if there is one.
fn to_io_error(error: &windows::core::Error) -> io::Error {
    // HRESULT_FROM_WIN32 maps Win32 codes to 0x8007xxxx.
    const FACILITY_WIN32_MASK: u32 = 0xFFFF_0000;
    const FACILITY_WIN32_VALUE: u32 = 0x8007_0000;

    #[expect(clippy::cast_sign_loss, reason = "HRESULT is a bit pattern")]
    let hresult = error.code().0 as u32;

    if hresult & FACILITY_WIN32_MASK == FACILITY_WIN32_VALUE {
        #[expect(
            clippy::cast_possible_wrap,
            reason = "Win32 error codes are 16-bit values"
        )]
        let code = (hresult & !FACILITY_WIN32_MASK) as i32;

        io::Error::from_raw_os_error(code)
    } else {
        io::Error::other(error.message())
    }
}
