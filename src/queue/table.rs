// src/queue/table.rs
//! Request table: per-command-identifier bookkeeping.
//!
//! A slot's `used` flag is the sole guard against identifier aliasing.
//! It is set when a submission reserves the identifier and cleared only
//! after the completion has been fully delivered, which happens with the
//! queue lock released, so the lock cannot be what prevents a concurrent
//! submission from reusing the identifier mid-completion. The flag is.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::device::BlockRequest;

/// Completion callback for commands with no attached block request
/// (administrative commands); receives the raw completion status.
pub type EndIoHandler = Box<dyn FnOnce(u16) + Send + 'static>;

struct RequestSlot {
    used: bool,
    request: Option<Arc<dyn BlockRequest>>,
    end_io: Option<EndIoHandler>,
    transfer_len: usize,
}

/// Fixed-capacity map from command identifier to in-flight bookkeeping.
pub(crate) struct RequestTable {
    slots: Box<[RequestSlot]>,
    cursor: u16,
}

impl RequestTable {
    pub(crate) fn new(depth: u16) -> Self {
        let mut slots = Vec::with_capacity(depth as usize);
        for _ in 0..depth {
            slots.push(RequestSlot {
                used: false,
                request: None,
                end_io: None,
                transfer_len: 0,
            });
        }
        Self {
            slots: slots.into_boxed_slice(),
            cursor: 0,
        }
    }

    /// Reserve the next command identifier and populate its slot.
    ///
    /// `transfer_len` is the length the submission path validated
    /// against the staging stride; completion must use this value, not a
    /// fresh `buffer_len()` call, since the request implementation is
    /// free to report a different length later.
    ///
    /// More than `depth` outstanding commands is a caller contract
    /// violation, and the ring would overflow; it panics rather than
    /// aliasing a live identifier.
    pub(crate) fn reserve(
        &mut self,
        request: Option<Arc<dyn BlockRequest>>,
        end_io: Option<EndIoHandler>,
        transfer_len: usize,
    ) -> u16 {
        let cid = self.cursor;
        self.cursor = (self.cursor + 1) % self.slots.len() as u16;
        let slot = &mut self.slots[cid as usize];
        assert!(
            !slot.used,
            "command identifier {cid} reused while still in flight"
        );
        slot.used = true;
        slot.request = request;
        slot.end_io = end_io;
        slot.transfer_len = transfer_len;
        cid
    }

    /// Take the bookkeeping out of an in-use slot for completion
    /// delivery, along with the transfer length captured at submission.
    /// The slot stays marked used until [`Self::release`].
    ///
    /// A completion for an identifier with no in-use slot means the
    /// device and driver disagree about outstanding commands; that state
    /// is unrecoverable and panics.
    pub(crate) fn take_for_completion(
        &mut self,
        cid: u16,
    ) -> (Option<Arc<dyn BlockRequest>>, Option<EndIoHandler>, usize) {
        let slot = &mut self.slots[cid as usize];
        assert!(
            slot.used,
            "completion for command identifier {cid} with no in-flight slot"
        );
        (slot.request.take(), slot.end_io.take(), slot.transfer_len)
    }

    /// Clear `used`, making the identifier reusable. Called only after
    /// completion delivery has finished.
    pub(crate) fn release(&mut self, cid: u16) {
        self.slots[cid as usize].used = false;
    }

    /// Drop a reservation whose submission never reached the device.
    pub(crate) fn abandon(&mut self, cid: u16) {
        let slot = &mut self.slots[cid as usize];
        slot.request = None;
        slot.end_io = None;
        slot.used = false;
    }

    #[cfg(test)]
    pub(crate) fn in_use(&self, cid: u16) -> bool {
        self.slots[cid as usize].used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_cycles_identifiers_through_the_depth() {
        let mut table = RequestTable::new(3);
        assert_eq!(table.reserve(None, None, 0), 0);
        assert_eq!(table.reserve(None, None, 0), 1);
        assert_eq!(table.reserve(None, None, 0), 2);

        table.take_for_completion(0);
        table.release(0);
        assert_eq!(table.reserve(None, None, 0), 0);
    }

    #[test]
    fn released_slots_are_reusable_but_taken_slots_stay_used() {
        let mut table = RequestTable::new(2);
        let cid = table.reserve(None, Some(Box::new(|_| {})), 0);
        assert!(table.in_use(cid));

        let (request, end_io, _) = table.take_for_completion(cid);
        assert!(request.is_none());
        assert!(end_io.is_some());
        // Delivery is still running; the identifier must not be free yet.
        assert!(table.in_use(cid));

        table.release(cid);
        assert!(!table.in_use(cid));
    }

    #[test]
    fn reserved_length_travels_to_completion() {
        let mut table = RequestTable::new(2);
        let cid = table.reserve(None, None, 64);
        let (_, _, len) = table.take_for_completion(cid);
        assert_eq!(len, 64);
    }

    #[test]
    #[should_panic(expected = "reused while still in flight")]
    fn reserving_a_live_identifier_panics() {
        let mut table = RequestTable::new(1);
        table.reserve(None, None, 0);
        table.reserve(None, None, 0);
    }

    #[test]
    #[should_panic(expected = "no in-flight slot")]
    fn completion_without_a_slot_panics() {
        let mut table = RequestTable::new(2);
        table.take_for_completion(1);
    }

    #[test]
    fn abandon_clears_the_reservation() {
        let mut table = RequestTable::new(2);
        let cid = table.reserve(None, Some(Box::new(|_| {})), 0);
        table.abandon(cid);
        assert!(!table.in_use(cid));
        assert_eq!(table.reserve(None, None, 0), 1);
    }
}
