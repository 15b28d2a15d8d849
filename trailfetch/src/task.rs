//! This module provides the worker pool draining a [`WorkQueue`] through a [`Stage`].

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{self, FutureExt};
use tracing::Instrument;

use crate::queue::{DoneGuard, WorkQueue};

/// The per-item work performed by the workers of a [`Pool`].
///
/// A stage owns the dequeued item for the duration of [`Stage::process()`] and may push follow-up
/// items (typically a retry of the same item) back into the queue it was pulled from.
/// The item is marked as done once the returned future completes, whatever its outcome.
pub trait Stage<T>: Send + Sync + 'static {
    fn process(&self, item: T, queue: &WorkQueue<T>) -> impl Future<Output = ()> + Send;
}

/// A fixed-size pool of workers pulling items one at a time from a shared [`WorkQueue`].
///
/// The pool size is independent of the queue depth: idle workers simply wait on the queue.
///
/// # Example
/// ```
/// # tokio_test::block_on(async {
/// # use std::sync::Arc;
/// # use trailfetch::queue::WorkQueue;
/// # use trailfetch::task::{Pool, Stage};
/// struct Hello;
///
/// impl Stage<usize> for Hello {
///     async fn process(&self, i: usize, _: &WorkQueue<usize>) {
///         println!("Hello from item #{i}!");
///     }
/// }
///
/// let queue = Arc::new(WorkQueue::default());
/// let mut pool = Pool::start(3.try_into().unwrap(), Arc::clone(&queue), Arc::new(Hello));
///
/// for i in 0..=5 {
///     queue.enqueue(i).unwrap();
/// }
///
/// queue.join().await;
/// pool.stop().await;
/// # })
/// ```
#[derive(Debug)]
pub struct Pool<T> {
    /// The pool of workers.
    workers: Vec<Worker>,
    /// The queue the workers are pulling from.
    queue: Arc<WorkQueue<T>>,
}

impl<T: Send + 'static> Pool<T> {
    /// Start a pool with `size` workers processing the items of `queue` with `stage`.
    pub fn start<S: Stage<T>>(size: NonZeroUsize, queue: Arc<WorkQueue<T>>, stage: Arc<S>) -> Self {
        static WORKER_ID: AtomicUsize = AtomicUsize::new(0);
        let size = size.get();
        let id = WORKER_ID.fetch_add(size, Ordering::Relaxed);

        let workers = (0..size)
            .map(|i| Worker::new(id.wrapping_add(i), Arc::clone(&queue), Arc::clone(&stage)))
            .collect();

        Self { workers, queue }
    }

    /// Close the queue and wait for the workers to process the remaining items and shut down.
    pub async fn stop(&mut self) {
        self.queue.close();
        let workers = std::mem::take(&mut self.workers);

        let results = future::join_all(workers.into_iter().inspect(|worker| {
            tracing::debug!("Stopping worker {}...", worker.id);
        }))
        .await;

        for err in results.into_iter().filter_map(Result::err) {
            tracing::error!("Worker terminated abnormally: {err}");
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

/// Run a whole batch through a fresh pool of `size` workers and wait for it to drain.
///
/// This is the enqueue / join / stop cycle of a single pipeline stage.
pub async fn run_batch<T, S>(size: NonZeroUsize, stage: Arc<S>, items: impl IntoIterator<Item = T>)
where
    T: Send + 'static,
    S: Stage<T>,
{
    let queue = Arc::new(WorkQueue::default());

    for item in items {
        // the queue is still open since the pool has not been stopped yet
        let _ = queue.enqueue(item);
    }

    let mut pool = Pool::start(size, Arc::clone(&queue), stage);

    queue.join().await;
    pool.stop().await;
}

#[derive(Debug)]
struct Worker {
    id: usize,
    handle: tokio::task::JoinHandle<()>,
}

impl Worker {
    fn new<T, S>(id: usize, queue: Arc<WorkQueue<T>>, stage: Arc<S>) -> Worker
    where
        T: Send + 'static,
        S: Stage<T>,
    {
        let span = tracing::debug_span!("worker", id);

        Worker {
            id,
            handle: tokio::spawn(
                async move {
                    tracing::debug!("Starting worker {id}...");

                    while let Some(item) = queue.dequeue().await {
                        let _done = DoneGuard(&queue);

                        stage.process(item, &queue).await;
                    }

                    tracing::debug!("All items exhausted, shutting down worker {id}.");
                }
                .instrument(span),
            ),
        }
    }
}

impl Future for Worker {
    type Output = Result<(), tokio::task::JoinError>;

    #[inline]
    fn poll(mut self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Self::Output> {
        self.handle.poll_unpin(cx)
    }
}
