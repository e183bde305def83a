//! Change publisher: delivers each cycle's changed coins to a single stream
//!
//! Every batch is handed to a detached task so the coin poller never waits for
//! a slow (or absent) consumer. A send and the stream's close are serialized
//! through one lock, and the `stopped` flag is checked under that lock right
//! before the send, so a late delivery after shutdown is dropped quietly
//! instead of racing the close.

use crate::{poller::wait_until_set, types::Coin};
use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Coins that were new or changed in one coin cycle
pub type CoinBatch = Vec<Coin>;

/// Receiving end of the change stream
///
/// Yields one batch per coin cycle that produced changes, and ends once the
/// fetcher has been stopped and every pending delivery has settled.
#[derive(Debug)]
pub struct CoinUpdates {
    rx: mpsc::Receiver<CoinBatch>,
}

impl CoinUpdates {
    /// Receives the next batch, or `None` once the stream is closed
    pub async fn recv(&mut self) -> Option<CoinBatch> {
        self.rx.recv().await
    }
}

impl Stream for CoinUpdates {
    type Item = CoinBatch;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

struct PublisherState {
    sender: Option<mpsc::Sender<CoinBatch>>,
    stopped: bool,
}

/// Publishes changed-coin batches without blocking the caller
pub struct ChangePublisher {
    state: Arc<Mutex<PublisherState>>,
    shutdown: watch::Receiver<bool>,
}

impl ChangePublisher {
    /// Creates a publisher and the stream it feeds
    ///
    /// # Arguments
    /// * `capacity` - Number of batches buffered for the consumer
    /// * `shutdown` - Stop signal of the owning poller
    pub fn new(capacity: usize, shutdown: watch::Receiver<bool>) -> (Self, CoinUpdates) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let publisher = Self {
            state: Arc::new(Mutex::new(PublisherState {
                sender: Some(tx),
                stopped: false,
            })),
            shutdown,
        };
        (publisher, CoinUpdates { rx })
    }

    /// Delivers `batch` on a detached task
    ///
    /// Returns the task handle, or `None` when there was nothing to deliver
    /// (empty batch or publisher already closed).
    pub fn publish(&self, batch: CoinBatch) -> Option<JoinHandle<()>> {
        if batch.is_empty() {
            return None;
        }

        let sender = {
            let state = self.state.lock();
            if state.stopped {
                return None;
            }
            state.sender.clone()?
        };

        let state = self.state.clone();
        let mut shutdown = self.shutdown.clone();

        Some(tokio::spawn(async move {
            let count = batch.len();

            tokio::select! {
                biased;

                _ = wait_until_set(&mut shutdown) => {
                    tracing::debug!(count, "Shutdown requested, dropping pending coin batch");
                }
                permit = sender.reserve() => match permit {
                    Ok(permit) => {
                        let state = state.lock();
                        if state.stopped {
                            tracing::debug!(count, "Publisher closed, dropping coin batch");
                            return;
                        }
                        permit.send(batch);
                        tracing::trace!(count, "Published coin batch");
                    }
                    Err(_) => {
                        tracing::debug!(count, "Change stream consumer is gone, dropping coin batch");
                    }
                },
            }
        }))
    }

    /// Marks the publisher stopped and releases its sender
    ///
    /// The stream ends once every in-flight delivery task has observed the
    /// stop and released its own sender clone.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        state.sender.take();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::coin;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_empty_batch_is_not_published() {
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (publisher, _updates) = ChangePublisher::new(4, stop_rx);
        assert!(publisher.publish(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn test_batch_is_delivered() {
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (publisher, mut updates) = ChangePublisher::new(4, stop_rx);

        let handle = publisher
            .publish(vec![coin("BTC", "Bitcoin", 1), coin("ETH", "Ethereum", 2)])
            .unwrap();
        handle.await.unwrap();

        let batch = updates.next().await.unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn test_publish_does_not_wait_for_consumer() {
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (publisher, mut updates) = ChangePublisher::new(1, stop_rx);

        // Nobody is reading: the second and third deliveries park on the
        // full buffer, but publish itself returns immediately.
        let handles: Vec<_> = (0..3)
            .filter_map(|i| publisher.publish(vec![coin("BTC", "Bitcoin", i + 1)]))
            .collect();
        assert_eq!(handles.len(), 3);

        for _ in 0..3 {
            assert!(updates.recv().await.is_some());
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_close_ends_stream_and_rejects_publishes() {
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (publisher, mut updates) = ChangePublisher::new(4, stop_rx);

        publisher.close();

        assert!(publisher.is_closed());
        assert!(publisher.publish(vec![coin("BTC", "Bitcoin", 1)]).is_none());
        assert!(updates.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pending_delivery_is_suppressed_on_shutdown() {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (publisher, mut updates) = ChangePublisher::new(1, stop_rx);

        publisher
            .publish(vec![coin("BTC", "Bitcoin", 1)])
            .unwrap()
            .await
            .unwrap();
        // Buffer is full, this one parks waiting for capacity
        let pending = publisher.publish(vec![coin("ETH", "Ethereum", 2)]).unwrap();

        stop_tx.send(true).unwrap();
        publisher.close();
        pending.await.unwrap();

        let first = updates.recv().await.unwrap();
        assert_eq!(first[0].symbol, "BTC");
        assert!(updates.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_consumer_is_not_a_fault() {
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (publisher, updates) = ChangePublisher::new(1, stop_rx);
        drop(updates);

        let handle = publisher.publish(vec![coin("BTC", "Bitcoin", 1)]).unwrap();
        assert!(handle.await.is_ok());
    }
}
