// src/queue/interrupt.rs
//! Interrupt-driven completion delivery.
//!
//! An interrupt queue must do as little as possible while the line is
//! being serviced: the handler takes the queue lock, harvests the
//! completion ring, and packages each completion tail (slot lookup,
//! staging copy, caller callbacks) as a deferred work item. The heavy
//! part then runs off interrupt context through the injected
//! [`WorkDispatcher`].

use alloc::boxed::Box;
use alloc::sync::Arc;

use log::warn;

use crate::irq::{InterruptLine, IrqHandler};
use crate::workqueue::WorkDispatcher;

use super::NvmeQueue;

/// How harvested completions reach their owners: on the harvesting
/// thread, or through a deferred work item.
pub(crate) enum CompletionDelivery {
    /// Polled queues finish completions directly.
    Direct,
    /// Interrupt queues defer completion tails to a dispatcher.
    Deferred(Arc<dyn WorkDispatcher>),
}

impl NvmeQueue {
    /// Per-entry completion trigger invoked by the harvest loop.
    pub(crate) fn trigger_completion(self: &Arc<Self>, cid: u16, status: u16) {
        match &self.delivery {
            CompletionDelivery::Direct => self.finish_completion(cid, status),
            CompletionDelivery::Deferred(dispatcher) => {
                let queue = Arc::clone(self);
                let deferred = Box::new(move || queue.finish_completion(cid, status));
                if dispatcher.try_queue(deferred).is_err() {
                    warn!(
                        "qid {}: dispatcher exhausted, completing cid {cid} in interrupt path",
                        self.qid
                    );
                    self.finish_exhausted(cid, status);
                }
            }
        }
    }
}

/// An [`NvmeQueue`] subscribed to a hardware interrupt line.
///
/// Built by [`NvmeQueue::interrupt_driven`]. The wrapped queue is shared:
/// submission paths clone the inner [`Arc`] and run concurrently with the
/// interrupt handler, serialized by the queue lock.
pub struct NvmeInterruptQueue {
    queue: Arc<NvmeQueue>,
    line: InterruptLine,
}

impl NvmeInterruptQueue {
    pub(crate) fn new(queue: Arc<NvmeQueue>, line: InterruptLine) -> Self {
        Self { queue, line }
    }

    /// The wrapped queue, for submissions.
    #[must_use]
    pub fn queue(&self) -> &Arc<NvmeQueue> {
        &self.queue
    }

    /// Interrupt entry point: harvest under the queue lock and report
    /// whether this queue produced completions, so shared lines can
    /// attribute the interrupt correctly.
    pub fn on_interrupt(&self) -> bool {
        self.queue.poll_completions()
    }
}

impl IrqHandler for NvmeInterruptQueue {
    fn line(&self) -> InterruptLine {
        self.line
    }

    fn handle_irq(&self) -> bool {
        self.on_interrupt()
    }
}
