// src/queue/mod.rs
//! The command-queue engine.
//!
//! A queue owns a submission ring, a completion ring, the doorbell pair
//! that publishes ring indices to the device, a request table correlating
//! command identifiers with in-flight bookkeeping, and a private staging
//! region payloads bounce through.
//!
//! # Locking
//!
//! One spin lock per queue serializes ring-index bookkeeping, request
//! table transitions and completion harvesting; it is safe to take from
//! interrupt context. The lock is deliberately *not* held across
//! caller-visible completion delivery: completion may re-enter the queue
//! with new submissions, and holding the lock there would deadlock. That
//! early release is only sound because a slot's `used` flag stays set
//! until delivery finishes, which keeps the identifier from being
//! reissued during the unlocked window.

mod interrupt;
mod ring;
mod table;

pub use interrupt::NvmeInterruptQueue;
pub use ring::Doorbell;
pub use table::EndIoHandler;

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::hint;
use core::sync::atomic::{AtomicU32, Ordering};

use log::{debug, error};
use spin::Mutex;

use crate::abi::{NvmeCompletion, NvmeSubmission};
use crate::device::{BlockRequest, RequestKind, RequestOutcome};
use crate::dma::{DmaRegion, StagingRegion};
use crate::errors::{DriverError, QueueError};
use crate::irq::InterruptLine;
use crate::workqueue::WorkDispatcher;

use interrupt::CompletionDelivery;
use ring::{CompletionRing, SubmissionRing};
use table::RequestTable;

/// Completions pulled off the ring per lock acquisition while harvesting.
/// Keeps interrupt-context batches bounded and allocation-free.
const HARVEST_BATCH: usize = 16;

/// Spin budget for [`NvmeQueue::submit_sync`].
const SYNC_SPIN_LIMIT: u32 = 1_000_000;

/// Sentinel for "no status published yet" in [`NvmeQueue::submit_sync`].
const SYNC_PENDING: u32 = u32::MAX;

/// DMA-backed memory a queue is constructed over.
///
/// All three regions and the doorbell mapping come from device bring-up
/// code and stay alive for the queue's whole lifetime.
pub struct QueueRegions {
    /// Submission ring storage, at least `depth` entries.
    pub submission: DmaRegion,
    /// Completion ring storage, at least `depth` entries.
    pub completion: DmaRegion,
    /// Read/write staging buffer, partitioned per command identifier.
    pub staging: DmaRegion,
    /// This queue's doorbell register pair.
    pub doorbell: Doorbell,
}

struct QueueState {
    sq: SubmissionRing,
    cq: CompletionRing,
    requests: RequestTable,
}

/// A submission/completion queue pair attached to the controller.
///
/// Construct with [`NvmeQueue::polled`] or
/// [`NvmeQueue::interrupt_driven`]; the two differ only in how harvested
/// completions reach their owners.
pub struct NvmeQueue {
    qid: u16,
    depth: u16,
    doorbell: Doorbell,
    staging: StagingRegion,
    delivery: CompletionDelivery,
    state: Mutex<QueueState>,
}

impl NvmeQueue {
    fn build(
        qid: u16,
        depth: u16,
        regions: QueueRegions,
        delivery: CompletionDelivery,
    ) -> Result<Arc<Self>, DriverError> {
        if depth == 0 {
            return Err(QueueError::InvalidDepth.into());
        }
        if regions.submission.len() < depth as usize * core::mem::size_of::<NvmeSubmission>() {
            return Err(QueueError::SubmissionRingTooSmall.into());
        }
        if regions.completion.len() < depth as usize * core::mem::size_of::<NvmeCompletion>() {
            return Err(QueueError::CompletionRingTooSmall.into());
        }
        let staging = StagingRegion::new(regions.staging, depth)?;
        debug!(
            "qid {qid}: created with depth {depth}, staging stride {} bytes",
            staging.stride()
        );
        Ok(Arc::new(Self {
            qid,
            depth,
            doorbell: regions.doorbell,
            staging,
            delivery,
            state: Mutex::new(QueueState {
                sq: SubmissionRing::new(regions.submission, depth),
                cq: CompletionRing::new(regions.completion, depth),
                requests: RequestTable::new(depth),
            }),
        }))
    }

    /// Create a queue whose completions are harvested by explicit polling
    /// and delivered on the polling thread.
    pub fn polled(qid: u16, depth: u16, regions: QueueRegions) -> Result<Arc<Self>, DriverError> {
        Self::build(qid, depth, regions, CompletionDelivery::Direct)
    }

    /// Create a queue harvested from an interrupt handler, with
    /// completion tails deferred onto `dispatcher`.
    pub fn interrupt_driven(
        qid: u16,
        depth: u16,
        regions: QueueRegions,
        line: InterruptLine,
        dispatcher: Arc<dyn WorkDispatcher>,
    ) -> Result<NvmeInterruptQueue, DriverError> {
        let queue = Self::build(qid, depth, regions, CompletionDelivery::Deferred(dispatcher))?;
        Ok(NvmeInterruptQueue::new(queue, line))
    }

    /// Queue index.
    #[must_use]
    pub fn qid(&self) -> u16 {
        self.qid
    }

    /// Maximum simultaneous outstanding commands.
    #[must_use]
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Largest transfer a single command can stage.
    #[must_use]
    pub fn max_transfer_len(&self) -> usize {
        self.staging.stride()
    }

    fn check_transfer(&self, len: usize) -> Result<(), DriverError> {
        if len > self.staging.stride() {
            return Err(QueueError::TransferTooLarge.into());
        }
        Ok(())
    }

    fn push_locked(&self, state: &mut QueueState, sub: &NvmeSubmission) {
        let tail = state.sq.push(sub);
        debug!(
            "qid {}: submitted opcode {:#04x} cid {} (sq tail {tail})",
            self.qid, sub.op, sub.cmdid
        );
        self.doorbell.ring_sq_tail(tail);
    }

    /// Submit a read attached to `request`. The device writes into the
    /// command's staging stride; the payload reaches the caller's buffer
    /// during completion, and only on success.
    ///
    /// Completion is asynchronous and reported through the request.
    ///
    /// # Errors
    ///
    /// [`QueueError::TransferTooLarge`] if the request's buffer exceeds
    /// [`Self::max_transfer_len`].
    pub fn submit_read(
        &self,
        request: Arc<dyn BlockRequest>,
        nsid: u32,
        lba: u64,
        count: u32,
    ) -> Result<(), DriverError> {
        let len = request.buffer_len();
        self.check_transfer(len)?;
        let mut state = self.state.lock();
        let cid = state.requests.reserve(Some(request), None, len);
        let sub = NvmeSubmission::read(cid, nsid, lba, count, self.staging.device_addr(cid).as_u64());
        self.push_locked(&mut state, &sub);
        Ok(())
    }

    /// Submit a write attached to `request`, staging its payload first.
    ///
    /// If the payload cannot be copied out of the caller's buffer the
    /// command never reaches the device: the request completes
    /// immediately with [`RequestOutcome::MemoryFault`] and the
    /// identifier is freed.
    ///
    /// # Errors
    ///
    /// [`QueueError::TransferTooLarge`] if the request's buffer exceeds
    /// [`Self::max_transfer_len`].
    pub fn submit_write(
        &self,
        request: Arc<dyn BlockRequest>,
        nsid: u32,
        lba: u64,
        count: u32,
    ) -> Result<(), DriverError> {
        let len = request.buffer_len();
        self.check_transfer(len)?;
        let mut state = self.state.lock();
        let cid = state.requests.reserve(Some(Arc::clone(&request)), None, len);
        // SAFETY: `cid` was just reserved; its stride is exclusively ours
        // until the slot is released.
        let staged = unsafe { self.staging.stride_slice_mut(cid, len) };
        if request.copy_to_staging(staged).is_err() {
            state.requests.abandon(cid);
            drop(state);
            request.complete(RequestOutcome::MemoryFault);
            return Ok(());
        }
        let sub =
            NvmeSubmission::write(cid, nsid, lba, count, self.staging.device_addr(cid).as_u64());
        self.push_locked(&mut state, &sub);
        Ok(())
    }

    /// Submit a command with no attached block request, e.g. an
    /// administrative command during bring-up. Only `end_io`, if given,
    /// observes the completion, receiving the raw status.
    ///
    /// The entry's `cmdid` field is overwritten with the reserved
    /// identifier. Returns that identifier.
    pub fn submit_command(&self, mut sub: NvmeSubmission, end_io: Option<EndIoHandler>) -> u16 {
        let mut state = self.state.lock();
        let cid = state.requests.reserve(None, end_io, 0);
        sub.cmdid = cid;
        self.push_locked(&mut state, &sub);
        cid
    }

    /// Submit an administrative command on a polled queue and spin until
    /// its completion arrives, returning the raw status. Bring-up helper;
    /// interrupt queues deliver through their dispatcher instead and
    /// would starve this loop.
    ///
    /// # Errors
    ///
    /// [`QueueError::Timeout`] if the spin budget runs out. The
    /// command's identifier is reclaimed on timeout, so the device must
    /// not complete it afterwards; a late completion for it is treated
    /// as a protocol violation.
    pub fn submit_sync(self: &Arc<Self>, sub: NvmeSubmission) -> Result<u16, DriverError> {
        let published = Arc::new(AtomicU32::new(SYNC_PENDING));
        let publish = Arc::clone(&published);
        let cid = self.submit_command(
            sub,
            Some(Box::new(move |status| {
                publish.store(u32::from(status), Ordering::Release);
            })),
        );
        let mut spins = 0u32;
        loop {
            let raw = published.load(Ordering::Acquire);
            if raw != SYNC_PENDING {
                return Ok(raw as u16);
            }
            self.poll_completions();
            spins += 1;
            if spins >= SYNC_SPIN_LIMIT {
                self.state.lock().requests.abandon(cid);
                return Err(QueueError::Timeout.into());
            }
            hint::spin_loop();
        }
    }

    /// Harvest pending completion entries and trigger delivery for each.
    ///
    /// Scans from the last-seen head, stopping at the first entry whose
    /// phase tag shows it has not been written yet, and publishes the new
    /// head to the completion doorbell per batch. Returns whether
    /// anything was harvested, which is the interrupt handler's "was
    /// this mine?" answer on shared lines.
    pub fn poll_completions(self: &Arc<Self>) -> bool {
        let mut harvested = 0usize;
        loop {
            let mut batch = [(0u16, 0u16); HARVEST_BATCH];
            let mut pulled = 0;
            {
                let mut state = self.state.lock();
                while pulled < HARVEST_BATCH {
                    let Some(entry) = state.cq.pop() else { break };
                    let cid = entry.command_id;
                    if cid >= self.depth {
                        error!("qid {}: completion names out-of-range cid {cid}", self.qid);
                        panic!("completion entry for command identifier {cid} beyond queue depth");
                    }
                    batch[pulled] = (cid, entry.status_code());
                    pulled += 1;
                }
                if pulled > 0 {
                    self.doorbell.ring_cq_head(state.cq.head());
                }
            }
            for &(cid, status) in &batch[..pulled] {
                self.trigger_completion(cid, status);
            }
            harvested += pulled;
            if pulled < HARVEST_BATCH {
                break;
            }
        }
        if harvested > 0 {
            debug!("qid {}: harvested {harvested} completion(s)", self.qid);
        }
        harvested > 0
    }

    /// Completion tail: runs on the polling thread for direct queues and
    /// inside a deferred work item for interrupt queues.
    pub(crate) fn finish_completion(&self, cid: u16, status: u16) {
        let mut outcome = RequestOutcome::Success;
        let (request, end_io) = {
            let mut state = self.state.lock();
            let (request, end_io, len) = state.requests.take_for_completion(cid);
            if status != 0 {
                outcome = RequestOutcome::Failure;
            } else if let Some(request) = request.as_ref() {
                if request.kind() == RequestKind::Read {
                    // SAFETY: the slot is still marked used, so this
                    // stride cannot be re-staged until release below.
                    // `len` was validated against the stride at
                    // submission; a fresh `buffer_len()` would let the
                    // request report a larger value here.
                    let staged = unsafe { self.staging.stride_slice(cid, len) };
                    if request.copy_from_staging(staged).is_err() {
                        outcome = RequestOutcome::MemoryFault;
                    }
                }
            }
            (request, end_io)
        };
        // Lock released: delivery may re-enter the queue. The still-set
        // `used` flag keeps `cid` from being reissued underneath us.
        if let Some(request) = request {
            request.complete(outcome);
        }
        if let Some(end_io) = end_io {
            end_io(status);
        }
        self.state.lock().requests.release(cid);
    }

    /// Dispatcher-exhaustion fallback: deliver the completion right here,
    /// under the queue lock in the interrupt path, rather than drop it.
    /// Longer interrupt latency, but the completion is never lost.
    pub(crate) fn finish_exhausted(&self, cid: u16, status: u16) {
        let mut state = self.state.lock();
        let (request, end_io, _) = state.requests.take_for_completion(cid);
        if let Some(request) = request {
            request.complete(RequestOutcome::OutOfMemory);
        }
        if let Some(end_io) = end_io {
            end_io(status);
        }
        state.requests.release(cid);
    }

    #[cfg(test)]
    pub(crate) fn slot_in_use(&self, cid: u16) -> bool {
        self.state.lock().requests.in_use(cid)
    }
}
