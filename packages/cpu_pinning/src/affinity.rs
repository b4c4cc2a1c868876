use tracing::error;

use crate::pal::{self, AffinityBackend, AffinityEditor, PlatformBackend};
use crate::{CpuMask, Error, ProcessorIndex, Result, ThreadHandle};

/// Binds threads to logical processors.
///
/// Accepts either a single processor index or a [`CpuMask`] spanning many processors and applies
/// it to either the calling thread or an explicitly given thread.
///
/// The platform backend is selected at compile time: processor groups on Windows, native
/// processor sets elsewhere. Any backend can be plugged in via [`with_backend()`][Self::with_backend],
/// for example one that talks to custom bindings instead of the real operating system.
///
/// # Example
///
/// ```no_run
/// use cpu_pinning::{Affinity, CpuMask};
///
/// let affinity = Affinity::new()?;
///
/// // Keep the current thread on the first two processors.
/// affinity.set_mask(&CpuMask::from_cpulist("0-1")?)?;
///
/// // Move a worker thread to processor 3.
/// let worker = std::thread::spawn(|| {});
/// affinity.set_thread(cpu_pinning::ThreadHandle::of(&worker), 3)?;
/// # worker.join().unwrap();
/// # Ok::<(), cpu_pinning::Error>(())
/// ```
///
/// # Thread safety
///
/// Every call uses its own editor and the backend state is read-only after construction, so one
/// instance can be shared between threads. Concurrent calls targeting the same thread are not
/// synchronized with each other; the last one to reach the operating system wins.
#[derive(Debug)]
pub struct Affinity<B = PlatformBackend> {
    backend: B,
}

impl Affinity {
    /// Creates an instance that uses the platform backend of the build target.
    ///
    /// # Errors
    ///
    /// On Windows, returns an error if the processor group topology cannot be queried.
    pub fn new() -> Result<Self> {
        Ok(Self {
            backend: pal::platform_backend()?,
        })
    }
}

impl<B> Affinity<B>
where
    B: AffinityBackend,
{
    /// Creates an instance that uses the given backend.
    #[must_use]
    pub const fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    /// The backend this instance delegates to.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of logical processors present in the system.
    #[must_use]
    pub fn count_cores(&self) -> u32 {
        self.backend.count_cores()
    }

    /// Binds a thread to one processor.
    ///
    /// # Errors
    ///
    /// Returns an error if the processor is out of range or does not exist, or if the operating
    /// system rejects the change.
    pub fn set_thread(&self, thread: ThreadHandle, processor: ProcessorIndex) -> Result<()> {
        let mut editor = self.backend.editor(thread)?;
        editor.set(processor)?;
        editor.apply()
    }

    /// Binds a thread to every processor selected in the mask.
    ///
    /// On Windows, a thread can only be bound to processors of one processor group. If the mask
    /// spans several groups, each group is applied in turn and the last group wins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyMask`] without touching the operating system if the mask selects
    /// nothing. Otherwise returns an error if a processor does not exist or if the operating
    /// system rejects the change.
    pub fn set_thread_mask(&self, thread: ThreadHandle, mask: &CpuMask) -> Result<()> {
        if mask.is_empty() {
            return Err(Error::EmptyMask);
        }

        let mut editor = self.backend.editor(thread)?;

        // Increasing order is required by backends that work one processor group at a time.
        for processor in mask.iter() {
            editor.set(processor)?;
        }

        editor.apply()
    }

    /// Binds the calling thread to one processor.
    ///
    /// # Errors
    ///
    /// See [`set_thread()`][Self::set_thread].
    pub fn set(&self, processor: ProcessorIndex) -> Result<()> {
        self.set_thread(self.backend.current_thread(), processor)
    }

    /// Binds the calling thread to every processor selected in the mask.
    ///
    /// # Errors
    ///
    /// See [`set_thread_mask()`][Self::set_thread_mask].
    pub fn set_mask(&self, mask: &CpuMask) -> Result<()> {
        self.set_thread_mask(self.backend.current_thread(), mask)
    }
}

/// Binds the calling thread to one processor, reporting failure via the return value.
///
/// Failures are logged as `tracing` errors. Use [`Affinity`] if you need to know why pinning
/// failed.
#[must_use = "pinning may fail, check the result if you rely on it"]
pub fn set_affinity(processor: ProcessorIndex) -> bool {
    match Affinity::new().and_then(|affinity| affinity.set(processor)) {
        Ok(()) => true,
        Err(e) => {
            error!(processor, error = %e, "failed to set affinity of the current thread");
            false
        }
    }
}

/// Binds the calling thread to every processor in the mask, reporting failure via the return
/// value.
///
/// Failures are logged as `tracing` errors. Use [`Affinity`] if you need to know why pinning
/// failed.
#[must_use = "pinning may fail, check the result if you rely on it"]
pub fn set_affinity_mask(mask: &CpuMask) -> bool {
    match Affinity::new().and_then(|affinity| affinity.set_mask(mask)) {
        Ok(()) => true,
        Err(e) => {
            error!(processors = %mask, error = %e, "failed to set affinity of the current thread");
            false
        }
    }
}
