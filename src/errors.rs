// src/errors.rs
//! Unified error types for the queue engine.
//!
//! Recoverable conditions are reported through these enums; protocol
//! violations (identifier aliasing, completions with no owning slot) are
//! driver-state corruption and panic instead.

use core::fmt;

/// Top-level driver error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// Queue construction or submission error.
    Queue(QueueError),
    /// DMA region error.
    Dma(DmaError),
    /// Caller-buffer transfer error.
    Memory(MemoryError),
    /// Deferred-work dispatch error.
    Dispatch(DispatchError),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue(e) => write!(f, "queue error: {}", e),
            Self::Dma(e) => write!(f, "DMA error: {}", e),
            Self::Memory(e) => write!(f, "memory error: {}", e),
            Self::Dispatch(e) => write!(f, "dispatch error: {}", e),
        }
    }
}

/// Queue construction and submission errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Queue depth of zero.
    InvalidDepth,
    /// Submission ring memory smaller than `depth` entries.
    SubmissionRingTooSmall,
    /// Completion ring memory smaller than `depth` entries.
    CompletionRingTooSmall,
    /// Transfer exceeds the per-command staging stride.
    TransferTooLarge,
    /// A synchronous submission exhausted its spin budget.
    Timeout,
}

impl QueueError {
    /// Static description of the error.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidDepth => "queue depth must be non-zero",
            Self::SubmissionRingTooSmall => "submission ring memory too small",
            Self::CompletionRingTooSmall => "completion ring memory too small",
            Self::TransferTooLarge => "transfer exceeds staging stride",
            Self::Timeout => "synchronous command timed out",
        }
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<QueueError> for DriverError {
    fn from(err: QueueError) -> Self {
        Self::Queue(err)
    }
}

/// DMA region errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaError {
    /// Null base pointer.
    NullRegion,
    /// Zero-length region.
    EmptyRegion,
    /// Region too small to partition across the queue depth.
    RegionTooSmall,
}

impl DmaError {
    /// Static description of the error.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NullRegion => "null region base",
            Self::EmptyRegion => "empty region",
            Self::RegionTooSmall => "region too small for queue depth",
        }
    }
}

impl fmt::Display for DmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DmaError> for DriverError {
    fn from(err: DmaError) -> Self {
        Self::Dma(err)
    }
}

/// Errors moving payload bytes between staging memory and caller buffers.
///
/// Reported by [`crate::device::BlockRequest`] implementations when the
/// caller-visible buffer cannot be reached, e.g. because the mapping
/// behind it went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The caller buffer is no longer accessible.
    InvalidBuffer,
    /// The caller buffer is shorter than the transfer.
    ShortBuffer,
}

impl MemoryError {
    /// Static description of the error.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidBuffer => "caller buffer not accessible",
            Self::ShortBuffer => "caller buffer too short",
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MemoryError> for DriverError {
    fn from(err: MemoryError) -> Self {
        Self::Memory(err)
    }
}

/// Deferred-work dispatch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The dispatcher cannot accept more work.
    Exhausted,
}

impl DispatchError {
    /// Static description of the error.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exhausted => "work dispatcher exhausted",
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DispatchError> for DriverError {
    fn from(err: DispatchError) -> Self {
        Self::Dispatch(err)
    }
}

/// Result type alias for driver operations.
pub type Result<T> = core::result::Result<T, DriverError>;
