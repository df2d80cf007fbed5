// src/queue/ring.rs
//! Ring storage and doorbell access.
//!
//! Both rings live in DMA memory shared with the device, so every entry
//! access is volatile, and a release fence orders the entry write against
//! the doorbell write that publishes it (the doorbell itself is written
//! by [`Doorbell`], owned by the queue).

use core::ptr::{self, NonNull};
use core::sync::atomic::{Ordering, fence};

use crate::abi::{DoorbellRegister, NvmeCompletion, NvmeSubmission};
use crate::dma::DmaRegion;
use crate::errors::DmaError;

/// Software-producer ring of submission entries.
pub(crate) struct SubmissionRing {
    region: DmaRegion,
    depth: u16,
    tail: u16,
}

impl SubmissionRing {
    pub(crate) fn new(region: DmaRegion, depth: u16) -> Self {
        Self {
            region,
            depth,
            tail: 0,
        }
    }

    /// Write `sub` at the tail and advance it, returning the new tail for
    /// the doorbell. The entry is fenced out before the caller rings.
    pub(crate) fn push(&mut self, sub: &NvmeSubmission) -> u16 {
        let slot = self.tail as usize;
        // SAFETY: the region holds `depth` entries (checked at queue
        // construction) and `tail` stays below `depth`.
        unsafe {
            ptr::write_volatile(
                self.region.as_ptr().cast::<NvmeSubmission>().add(slot),
                *sub,
            );
        }
        fence(Ordering::Release);
        self.tail = (self.tail + 1) % self.depth;
        self.tail
    }
}

/// Device-producer ring of completion entries.
///
/// The expected phase starts at 1 and flips on every wrap; an entry whose
/// phase tag does not match has not been written since software last
/// consumed this slot.
pub(crate) struct CompletionRing {
    region: DmaRegion,
    depth: u16,
    head: u16,
    phase: bool,
}

impl CompletionRing {
    pub(crate) fn new(region: DmaRegion, depth: u16) -> Self {
        Self {
            region,
            depth,
            head: 0,
            phase: true,
        }
    }

    /// Consume the entry at the head if the device has written it.
    pub(crate) fn pop(&mut self) -> Option<NvmeCompletion> {
        fence(Ordering::Acquire);
        // SAFETY: the region holds `depth` entries and `head` stays below
        // `depth`.
        let entry = unsafe {
            ptr::read_volatile(
                self.region
                    .as_ptr()
                    .cast::<NvmeCompletion>()
                    .add(self.head as usize),
            )
        };
        if entry.phase() != self.phase {
            return None;
        }
        self.head = (self.head + 1) % self.depth;
        if self.head == 0 {
            self.phase = !self.phase;
        }
        Some(entry)
    }

    /// Current head, for the completion doorbell.
    pub(crate) fn head(&self) -> u16 {
        self.head
    }
}

/// Volatile handle to a queue's memory-mapped doorbell pair.
pub struct Doorbell {
    regs: NonNull<DoorbellRegister>,
}

impl Doorbell {
    /// Wrap a mapped doorbell register pair.
    ///
    /// # Safety
    ///
    /// `regs` must point at this queue's doorbell registers, mapped for
    /// the queue's whole lifetime and written by nobody else.
    ///
    /// # Errors
    ///
    /// [`DmaError::NullRegion`] if `regs` is null.
    pub unsafe fn new(regs: *mut DoorbellRegister) -> core::result::Result<Self, DmaError> {
        let Some(regs) = NonNull::new(regs) else {
            return Err(DmaError::NullRegion);
        };
        Ok(Self { regs })
    }

    /// Publish a new submission tail to the device.
    pub(crate) fn ring_sq_tail(&self, tail: u16) {
        // SAFETY: `regs` is a valid exclusive mapping per `new`'s contract.
        unsafe {
            ptr::write_volatile(
                &raw mut (*self.regs.as_ptr()).sq_tail,
                u32::from(tail),
            );
        }
    }

    /// Publish a new completion head to the device.
    pub(crate) fn ring_cq_head(&self, head: u16) {
        // SAFETY: as for `ring_sq_tail`.
        unsafe {
            ptr::write_volatile(
                &raw mut (*self.regs.as_ptr()).cq_head,
                u32::from(head),
            );
        }
    }
}

// SAFETY: the doorbell mapping is exclusive to this handle and every
// access is a volatile write serialized by the queue lock.
unsafe impl Send for Doorbell {}
// SAFETY: as above.
unsafe impl Sync for Doorbell {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::PhysAddr;

    fn completion_ring(mem: &mut [NvmeCompletion]) -> CompletionRing {
        let bytes = core::mem::size_of_val(mem);
        let region = unsafe {
            DmaRegion::from_raw_parts(mem.as_mut_ptr().cast(), PhysAddr::new(0x2000), bytes)
        }
        .unwrap();
        CompletionRing::new(region, mem.len() as u16)
    }

    #[test]
    fn pop_tracks_phase_across_wrap() {
        let mut mem = vec![NvmeCompletion::zeroed(); 2].into_boxed_slice();
        let mut ring = completion_ring(&mut mem);

        // Nothing written yet: phase tags are all zero, expected phase is 1.
        assert!(ring.pop().is_none());

        mem[0] = NvmeCompletion::with_status(0, 0, true);
        mem[1] = NvmeCompletion::with_status(1, 0, true);
        assert_eq!(ring.pop().unwrap().command_id, 0);
        assert_eq!(ring.pop().unwrap().command_id, 1);
        assert_eq!(ring.head(), 0);

        // The ring wrapped; the same entries now carry a stale phase.
        assert!(ring.pop().is_none());

        mem[0] = NvmeCompletion::with_status(2, 0, false);
        assert_eq!(ring.pop().unwrap().command_id, 2);
        assert_eq!(ring.head(), 1);
    }

    #[test]
    fn submission_push_writes_entry_and_wraps_tail() {
        let mut mem = vec![NvmeSubmission::zeroed(); 2].into_boxed_slice();
        let bytes = core::mem::size_of_val(&mem[..]);
        let region = unsafe {
            DmaRegion::from_raw_parts(mem.as_mut_ptr().cast(), PhysAddr::new(0x3000), bytes)
        }
        .unwrap();
        let mut ring = SubmissionRing::new(region, 2);

        let sub = NvmeSubmission::read(7, 1, 0, 1, 0x9000);
        assert_eq!(ring.push(&sub), 1);
        assert_eq!(ring.push(&sub), 0);
        assert_eq!(mem[0].cmdid, 7);
        assert_eq!(mem[1].cmdid, 7);
    }
}
