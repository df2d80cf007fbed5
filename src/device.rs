// src/device.rs
//! Block-request contract between the queue engine and its callers.
//!
//! A [`BlockRequest`] is the caller-visible asynchronous I/O object a
//! command may be attached to. The engine never owns one; it borrows the
//! request for as long as the command's request-table slot is in use and
//! reports back through [`BlockRequest::complete`] exactly once.

use crate::errors::MemoryError;

/// Direction of a block request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Device-to-caller transfer.
    Read,
    /// Caller-to-device transfer.
    Write,
}

/// Terminal outcome of a block request.
///
/// Exactly one of these is reported per request. The engine never
/// retries; policy beyond a single report belongs to the issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The device completed the command with zero status and, for reads,
    /// the payload reached the caller buffer.
    Success,
    /// The device reported a non-zero status.
    Failure,
    /// Copying between staging memory and the caller buffer failed.
    MemoryFault,
    /// Completion had to be delivered through the resource-exhaustion
    /// fallback path.
    OutOfMemory,
}

/// The caller-visible asynchronous I/O request a command completes.
///
/// Payloads move through the queue's staging region rather than the
/// caller's buffer directly, because the device can only address
/// physically contiguous, pre-mapped memory. The two copy methods bridge
/// that gap and may fail if the caller's memory became invalid.
pub trait BlockRequest: Send + Sync {
    /// Read or write.
    fn kind(&self) -> RequestKind;

    /// Length of the caller-visible buffer in bytes.
    fn buffer_len(&self) -> usize;

    /// Copy the caller's payload out into staging memory (write requests,
    /// before submission).
    fn copy_to_staging(&self, dst: &mut [u8]) -> core::result::Result<(), MemoryError>;

    /// Copy staged device data into the caller's buffer (read requests,
    /// after a successful completion).
    fn copy_from_staging(&self, src: &[u8]) -> core::result::Result<(), MemoryError>;

    /// Deliver the terminal outcome. Invoked exactly once per request.
    fn complete(&self, outcome: RequestOutcome);
}
