//! An unbounded multi-producer multi-consumer work queue with `join` semantics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::{mpsc, Mutex, Notify};

pub use tokio::sync::mpsc::error::SendError;

/// A FIFO of work items shared by producers and a pool of consumers.
///
/// Every successful [`enqueue()`](WorkQueue::enqueue) must eventually be matched by exactly one
/// [`mark_done()`](WorkQueue::mark_done), at which point [`join()`](WorkQueue::join) returns.
/// All the items of a batch are expected to be enqueued before `join()` starts waiting, except for
/// items re-enqueued by consumers while they still hold an unfinished one.
///
/// # Example
/// ```
/// # tokio_test::block_on(async {
/// # use trailfetch::queue::WorkQueue;
/// let queue = WorkQueue::default();
///
/// for key in ["a", "b", "c"] {
///     queue.enqueue(key).unwrap();
/// }
///
/// while queue.unfinished() > 0 {
///     let key = queue.dequeue().await.unwrap();
///     println!("Processing {key}...");
///     queue.mark_done();
/// }
///
/// queue.join().await;
/// # })
/// ```
#[derive(Debug)]
pub struct WorkQueue<T> {
    /// The sending part, taken away once the queue is closed.
    sender: RwLock<Option<mpsc::UnboundedSender<T>>>,
    /// The receiving part, shared by all consumers: the next available one waits for the lock.
    receiver: Mutex<mpsc::UnboundedReceiver<T>>,
    /// Number of enqueued items not marked as done yet.
    unfinished: AtomicUsize,
    /// Notified whenever `unfinished` drops to zero.
    drained: Notify,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        Self {
            sender: RwLock::new(Some(sender)),
            receiver: Mutex::new(receiver),
            unfinished: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }
}

impl<T> WorkQueue<T> {
    /// Push an item at the back of the queue.
    ///
    /// The item is handed back if the queue has been closed.
    pub fn enqueue(&self, item: T) -> Result<(), SendError<T>> {
        let sender = self.sender.read().unwrap_or_else(PoisonError::into_inner);

        let Some(sender) = sender.as_ref() else {
            return Err(SendError(item));
        };

        // account for the item before any consumer can see it
        self.unfinished.fetch_add(1, Ordering::AcqRel);

        sender.send(item).inspect_err(|_| self.finish_one())
    }

    /// Wait for the next item.
    ///
    /// Returns `None` once the queue has been closed and every pending item has been dequeued.
    pub async fn dequeue(&self) -> Option<T> {
        self.receiver.lock().await.recv().await
    }

    /// Account for a dequeued item whose processing is over, whatever its outcome.
    pub fn mark_done(&self) {
        self.finish_one();
    }

    /// Wait until every enqueued item has been marked as done.
    pub async fn join(&self) {
        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);

            // register interest before checking so that a concurrent `mark_done()` can't be missed
            drained.as_mut().enable();

            if self.unfinished.load(Ordering::Acquire) == 0 {
                return;
            }

            drained.await;
        }
    }

    /// Close the queue: subsequent enqueues fail and consumers stop once pending items are drained.
    pub fn close(&self) {
        self.sender.write().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Number of enqueued items not marked as done yet.
    #[inline]
    pub fn unfinished(&self) -> usize {
        self.unfinished.load(Ordering::Acquire)
    }

    fn finish_one(&self) {
        match self.unfinished.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1)) {
            Ok(1) => self.drained.notify_waiters(),
            Ok(_) => {}
            Err(_) => tracing::warn!("Work item marked as done more times than items were enqueued"),
        }
    }
}

/// Marks a dequeued item as done when dropped, so that a panicking stage still releases its slot.
pub(crate) struct DoneGuard<'a, T>(pub(crate) &'a WorkQueue<T>);

impl<T> Drop for DoneGuard<'_, T> {
    fn drop(&mut self) {
        self.0.mark_done();
    }
}
