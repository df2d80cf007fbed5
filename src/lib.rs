// src/lib.rs
//! NVMe-style command-queue engine for a block-storage controller.
//!
//! The controller is driven through paired rings of fixed-size entries:
//! software writes command entries into a submission ring and rings a
//! doorbell; the device writes completion entries into a completion ring,
//! tagged with a phase bit so new entries can be detected without a
//! separate signal. This crate owns that ring protocol end to end:
//!
//! - [`abi`]: the bit-exact entry and doorbell layouts
//! - [`dma`]: pinned, physically addressed ring and staging memory
//! - [`queue`]: the queue engine itself, in a polled and an
//!   interrupt-driven flavour
//! - [`workqueue`]: the deferred-work contract interrupt queues hand
//!   their completion tails to
//!
//! Device enumeration, controller bring-up and PCI glue are the caller's
//! problem; a queue is constructed from already-mapped DMA memory and a
//! doorbell mapping and never resized afterwards.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

pub mod abi;
pub mod device;
pub mod dma;
pub mod errors;
pub mod irq;
pub mod queue;
pub mod workqueue;

pub use abi::{DoorbellRegister, NvmeCompletion, NvmeSubmission, OP_IO_READ, OP_IO_WRITE};
pub use device::{BlockRequest, RequestKind, RequestOutcome};
pub use dma::{DmaRegion, PhysAddr, StagingRegion};
pub use errors::{DispatchError, DmaError, DriverError, MemoryError, QueueError, Result};
pub use irq::{InterruptLine, IrqHandler};
pub use queue::{Doorbell, EndIoHandler, NvmeInterruptQueue, NvmeQueue, QueueRegions};
pub use workqueue::{WorkDispatcher, WorkItem, WorkQueue};
