use std::io;

use thiserror::Error;

use crate::ProcessorIndex;

/// Errors that can occur when inspecting processors or changing thread affinity.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The operating system did not provide a processor set to accumulate the selection in.
    #[error("failed to allocate a processor set with capacity for {capacity} processors")]
    CpuSetAllocation {
        /// The number of processors the set was requested to hold.
        capacity: ProcessorIndex,
    },

    /// The processor group topology could not be obtained from the operating system.
    #[error("processor group topology query failed during {stage} with status {status}")]
    TopologyQuery {
        /// Which step of the query failed ("probe" or "fill").
        stage: &'static str,

        /// Native status code reported by the operating system, or -1 if none was available.
        status: i32,

        /// The underlying operating system error.
        #[source]
        source: Option<io::Error>,
    },

    /// The operating system returned processor group topology data that could not be decoded.
    #[error("processor group topology is malformed: {problem}")]
    MalformedTopology {
        /// A human-readable description of the problem.
        problem: String,
    },

    /// A processor index was at or beyond the supported maximum.
    #[error("processor {processor} is out of range, the maximum supported index is {max}")]
    ProcessorOutOfRange {
        /// The requested processor index.
        processor: ProcessorIndex,

        /// The largest valid processor index.
        max: ProcessorIndex,
    },

    /// The caller asked for an affinity that selects no processors at all.
    #[error("processor selection is empty, at least one processor must be selected")]
    EmptyMask,

    /// Processors were supplied in decreasing order to an editor that requires increasing order.
    #[error(
        "processor {processor} was supplied after processors of a group starting at {group_start}, processors must be supplied in increasing order"
    )]
    OrderViolation {
        /// The processor index that arrived out of order.
        processor: ProcessorIndex,

        /// The first processor index of the group the editor was already working on.
        group_start: ProcessorIndex,
    },

    /// No processor group of the system contains the requested processor.
    #[error("processor {processor} does not exist in any processor group of this system")]
    ProcessorNotFound {
        /// The requested processor index.
        processor: ProcessorIndex,
    },

    /// A native affinity call reported failure.
    #[error("{operation} failed with status {status}")]
    Os {
        /// The native operation that failed.
        operation: &'static str,

        /// Native status code (errno or Win32 error code), or -1 if none was available.
        status: i32,

        /// The underlying operating system error.
        #[source]
        source: io::Error,
    },

    /// A cpulist string could not be parsed into a processor mask.
    #[error(transparent)]
    InvalidCpulist(#[from] cpulist::Error),
}

impl Error {
    pub(crate) fn os(operation: &'static str, source: io::Error) -> Self {
        Self::Os {
            operation,
            status: native_status(&source),
            source,
        }
    }
}

/// Extracts the native status code from an I/O error, using -1 when there is none.
pub(crate) fn native_status(error: &io::Error) -> i32 {
    error.raw_os_error().unwrap_or(-1)
}

/// A specialized `Result` type for affinity operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;
