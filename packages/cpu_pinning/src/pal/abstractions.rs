use std::fmt::Debug;

use crate::{ProcessorIndex, Result, ThreadHandle};

/// A platform-specific way of binding native threads to logical processors.
///
/// Each call that changes affinity creates a fresh [`AffinityEditor`], feeds it the selected
/// processors and commits the selection via [`AffinityEditor::apply()`].
pub trait AffinityBackend: Debug + Send + Sync {
    /// The per-call editor type used to accumulate and commit a selection.
    type Editor<'a>: AffinityEditor
    where
        Self: 'a;

    /// Creates an editor that will commit its selection to the given thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform resources needed to hold a selection cannot be obtained.
    fn editor(&self, thread: ThreadHandle) -> Result<Self::Editor<'_>>;

    /// The native handle of the calling thread.
    fn current_thread(&self) -> ThreadHandle;

    /// Number of logical processors present in the system.
    fn count_cores(&self) -> u32;
}

/// Accumulates a processor selection for one thread and commits it to the operating system.
///
/// Processors must be supplied to [`set()`][Self::set] in non-decreasing order. Backends that
/// can only hold part of the selection at a time (e.g. one Windows processor group) rely on this
/// to know when the pending part is complete.
pub trait AffinityEditor {
    /// Adds a processor to the pending selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the processor does not exist, is out of range or was supplied out of
    /// order. Some backends flush a completed part of the selection to the operating system here,
    /// in which case operating system errors are also possible.
    fn set(&mut self, processor: ProcessorIndex) -> Result<()>;

    /// Commits the pending selection to the target thread.
    ///
    /// This is a flush, not a one-shot commit: it may be called again after adding more
    /// processors.
    ///
    /// # Errors
    ///
    /// Returns an error if the operating system rejects the selection.
    fn apply(&mut self) -> Result<()>;
}
