// src/abi/mod.rs
//! Wire-level protocol definitions shared with the device.
//!
//! Everything in here is layout-sensitive: the device reads submission
//! entries and writes completion entries exactly as laid out by these
//! structures.

pub mod nvme;

pub use nvme::{
    DoorbellRegister, NvmeCompletion, NvmeSubmission, OP_IO_READ, OP_IO_WRITE, PHASE_TAG_MASK,
    STATUS_FIELD_MASK,
};
