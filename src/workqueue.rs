// src/workqueue.rs
//! Deferred-work dispatch contract and a bounded FIFO implementation.
//!
//! Interrupt queues keep interrupt-context work minimal by packaging each
//! completion tail as a closure and handing it to a [`WorkDispatcher`].
//! The dispatcher is an injected collaborator, not a global: tests supply
//! a deterministic fake, and a kernel wires in whatever background worker
//! infrastructure it runs.

use alloc::boxed::Box;
use alloc::collections::VecDeque;

use spin::Mutex;

use crate::errors::DispatchError;

/// A deferred task: runs once, later, off the submitting context.
pub type WorkItem = Box<dyn FnOnce() + Send + 'static>;

/// Accepts deferred tasks for later execution.
///
/// Tasks submitted by one source run in FIFO order relative to each
/// other; no ordering is promised against unrelated submitters. Accepting
/// a task may fail under resource exhaustion, and callers must cope;
/// the queue engine falls back to synchronous completion when it does.
pub trait WorkDispatcher: Send + Sync {
    /// Queue `item` for later execution.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Exhausted`] if the dispatcher is out of capacity.
    fn try_queue(&self, item: WorkItem) -> core::result::Result<(), DispatchError>;
}

/// A bounded FIFO work queue.
///
/// Producers call [`WorkDispatcher::try_queue`] from any context,
/// including interrupt handlers; some background context drains it with
/// [`WorkQueue::drain`]. Items run outside the internal lock, so a
/// running item may itself queue more work.
pub struct WorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
    capacity: usize,
}

impl WorkQueue {
    /// Create a queue holding at most `capacity` pending items.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Number of items waiting to run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether nothing is waiting to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Run pending items until the queue is empty, returning how many ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        loop {
            let item = self.items.lock().pop_front();
            let Some(item) = item else {
                break;
            };
            item();
            ran += 1;
        }
        ran
    }
}

impl WorkDispatcher for WorkQueue {
    fn try_queue(&self, item: WorkItem) -> core::result::Result<(), DispatchError> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(DispatchError::Exhausted);
        }
        items.push_back(item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    #[test]
    fn runs_items_in_fifo_order() {
        let queue = WorkQueue::new(8);
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 0..3 {
            let order = Arc::clone(&order);
            queue
                .try_queue(Box::new(move || order.lock().push(n)))
                .unwrap();
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.drain(), 3);
        assert!(queue.is_empty());
        assert_eq!(*order.lock(), [0, 1, 2]);
    }

    #[test]
    fn rejects_items_beyond_capacity() {
        let queue = WorkQueue::new(1);
        queue.try_queue(Box::new(|| {})).unwrap();
        assert_eq!(
            queue.try_queue(Box::new(|| {})).unwrap_err(),
            DispatchError::Exhausted
        );
        queue.drain();
        queue.try_queue(Box::new(|| {})).unwrap();
    }

    #[test]
    fn items_may_queue_more_work_while_draining() {
        let queue = Arc::new(WorkQueue::new(4));
        let inner = Arc::clone(&queue);
        queue
            .try_queue(Box::new(move || {
                inner.try_queue(Box::new(|| {})).unwrap();
            }))
            .unwrap();
        assert_eq!(queue.drain(), 2);
    }
}
