use std::fmt::{self, Display};
use std::thread::JoinHandle;

/// Identifies a native operating system thread whose affinity can be changed.
///
/// This is a `pthread_t` on Unix-like systems and a thread `HANDLE` on Windows. The value is
/// opaque to this package; it is only ever passed back to the operating system.
///
/// A handle does not keep the thread alive. Changing the affinity of a thread that has already
/// exited is undefined behavior at the operating system level, so keep the owning
/// [`JoinHandle`] around for as long as you use the handle obtained from it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ThreadHandle(usize);

impl ThreadHandle {
    /// Wraps a raw native thread identifier.
    #[must_use]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw native thread identifier.
    #[must_use]
    pub const fn as_raw(self) -> usize {
        self.0
    }

    /// The native handle of a thread spawned via the Rust standard library.
    #[cfg(unix)]
    #[must_use]
    pub fn of<T>(thread: &JoinHandle<T>) -> Self {
        use std::os::unix::thread::JoinHandleExt;

        #[allow(
            clippy::cast_possible_truncation,
            clippy::unnecessary_cast,
            reason = "pthread_t is an unsigned long or pointer-sized integer on supported platforms"
        )]
        let raw = thread.as_pthread_t() as usize;

        Self(raw)
    }

    /// The native handle of a thread spawned via the Rust standard library.
    #[cfg(windows)]
    #[must_use]
    pub fn of<T>(thread: &JoinHandle<T>) -> Self {
        use std::os::windows::io::AsRawHandle;

        Self(thread.as_raw_handle().addr())
    }
}

impl Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread {:#x}", self.0)
    }
}
