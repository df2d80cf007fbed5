// src/abi/nvme.rs
//! Submission entry, completion entry and doorbell register layouts.
//!
//! # Memory Layout
//!
//! All structures are `#[repr(C)]`; the device consumes them as raw
//! memory. A submission entry is 64 bytes, a completion entry 16 bytes,
//! and both sizes are pinned by compile-time assertions.
//!
//! # Phase tag
//!
//! Bit 0 of a completion entry's status word is the phase tag. The device
//! toggles the tag value it writes every time the completion ring wraps,
//! so software can tell freshly written entries from stale ones without a
//! separate "new data" flag. Bits 15:1 carry the status code proper.

/// I/O write command opcode.
pub const OP_IO_WRITE: u8 = 0x01;

/// I/O read command opcode.
pub const OP_IO_READ: u8 = 0x02;

/// Phase tag bit in a completion status word.
pub const PHASE_TAG_MASK: u16 = 0x0001;

/// Status code field in a completion status word (everything above the
/// phase tag).
pub const STATUS_FIELD_MASK: u16 = 0xfffe;

/// Submission Queue Entry.
///
/// Written by software into the submission ring, consumed by the device.
/// `cmdid` correlates the eventual completion entry with the request-table
/// slot that owns this command.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvmeSubmission {
    /// Command opcode.
    pub op: u8,
    /// Fused-operation / PRP selection flags.
    pub flags: u8,
    /// Command identifier, drawn from `[0, queue depth)`.
    pub cmdid: u16,
    /// Namespace identifier.
    pub nsid: u32,
    /// Reserved.
    pub rsvd1: u64,
    /// Metadata pointer.
    pub meta_ptr: u64,
    /// First data pointer (physical address of the payload).
    pub prp1: u64,
    /// Second data pointer (payloads spanning more than one page).
    pub prp2: u64,
    /// Command dword 10 (read/write: starting LBA, low half).
    pub cdw10: u32,
    /// Command dword 11 (read/write: starting LBA, high half).
    pub cdw11: u32,
    /// Command dword 12 (read/write: zero-based block count).
    pub cdw12: u32,
    /// Command dword 13.
    pub cdw13: u32,
    /// Command dword 14.
    pub cdw14: u32,
    /// Command dword 15.
    pub cdw15: u32,
}

impl NvmeSubmission {
    /// An all-zero entry.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            op: 0,
            flags: 0,
            cmdid: 0,
            nsid: 0,
            rsvd1: 0,
            meta_ptr: 0,
            prp1: 0,
            prp2: 0,
            cdw10: 0,
            cdw11: 0,
            cdw12: 0,
            cdw13: 0,
            cdw14: 0,
            cdw15: 0,
        }
    }

    /// Build an I/O read command. `count` is the 1-based block count; the
    /// wire field is zero-based.
    #[must_use]
    pub const fn read(cmdid: u16, nsid: u32, lba: u64, count: u32, prp1: u64) -> Self {
        let mut sub = Self::zeroed();
        sub.op = OP_IO_READ;
        sub.cmdid = cmdid;
        sub.nsid = nsid;
        sub.prp1 = prp1;
        sub.cdw10 = lba as u32;
        sub.cdw11 = (lba >> 32) as u32;
        sub.cdw12 = count.saturating_sub(1);
        sub
    }

    /// Build an I/O write command. `count` is the 1-based block count.
    #[must_use]
    pub const fn write(cmdid: u16, nsid: u32, lba: u64, count: u32, prp1: u64) -> Self {
        let mut sub = Self::zeroed();
        sub.op = OP_IO_WRITE;
        sub.cmdid = cmdid;
        sub.nsid = nsid;
        sub.prp1 = prp1;
        sub.cdw10 = lba as u32;
        sub.cdw11 = (lba >> 32) as u32;
        sub.cdw12 = count.saturating_sub(1);
        sub
    }
}

impl Default for NvmeSubmission {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Completion Queue Entry.
///
/// Written by the device into the completion ring, consumed by software.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NvmeCompletion {
    /// Command-specific result dword.
    pub cmd_spec: u32,
    /// Reserved.
    pub rsvd: u32,
    /// Submission-ring head as seen by the device.
    pub sq_head: u16,
    /// Submission queue the command came from.
    pub sq_id: u16,
    /// Identifier of the completed command.
    pub command_id: u16,
    /// Phase tag (bit 0) and status code (bits 15:1).
    pub status: u16,
}

impl NvmeCompletion {
    /// An all-zero entry (phase tag clear).
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            cmd_spec: 0,
            rsvd: 0,
            sq_head: 0,
            sq_id: 0,
            command_id: 0,
            status: 0,
        }
    }

    /// Build an entry carrying `status_code` for `command_id` with the
    /// given phase tag. This is the device-side view; the driver only ever
    /// reads entries, so this is mostly useful for emulation and tests.
    #[must_use]
    pub const fn with_status(command_id: u16, status_code: u16, phase: bool) -> Self {
        let mut cqe = Self::zeroed();
        cqe.command_id = command_id;
        cqe.status = (status_code << 1) | phase as u16;
        cqe
    }

    /// The phase tag the device wrote this entry with.
    #[must_use]
    pub const fn phase(&self) -> bool {
        self.status & PHASE_TAG_MASK != 0
    }

    /// The status code, with the phase tag stripped. Zero means success.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        (self.status & STATUS_FIELD_MASK) >> 1
    }
}

impl Default for NvmeCompletion {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Per-queue doorbell register pair, memory-mapped by the controller.
///
/// Software writes the new submission tail after publishing entries and
/// the new completion head after consuming them.
#[repr(C)]
#[derive(Debug)]
pub struct DoorbellRegister {
    /// Submission ring tail index.
    pub sq_tail: u32,
    /// Completion ring head index.
    pub cq_head: u32,
}

impl DoorbellRegister {
    /// Both indices zero, the state a freshly created queue expects.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sq_tail: 0,
            cq_head: 0,
        }
    }
}

impl Default for DoorbellRegister {
    fn default() -> Self {
        Self::new()
    }
}

// Compile-time layout assertions
const _: () = {
    assert!(
        core::mem::size_of::<NvmeSubmission>() == 64,
        "submission entry must be 64 bytes"
    );
    assert!(
        core::mem::size_of::<NvmeCompletion>() == 16,
        "completion entry must be 16 bytes"
    );
    assert!(
        core::mem::size_of::<DoorbellRegister>() == 8,
        "doorbell pair must be 8 bytes"
    );
};
