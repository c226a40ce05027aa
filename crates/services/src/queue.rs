//! Bounded work queue and its single dispatcher
//!
//! Producers (the HTTP handlers) wait for a free slot instead of dropping
//! items. Exactly one [`Dispatcher`] consumes the queue and forwards items
//! to service B one at a time, in FIFO order.

use std::time::Duration;

use backflow_metrics::{DispatchOutcome, MetricsCollector, QueueSource};
use backflow_types::{WorkItem, PROCESS_PATH};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::RetryingClient;
use crate::error::{DispatcherError, QueueError};

/// Create a queue holding at most `capacity` items
pub fn work_queue(capacity: usize) -> (WorkQueue, WorkReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let metrics = MetricsCollector::new();
    (WorkQueue { tx, metrics }, WorkReceiver { rx, metrics })
}

/// Producer side of the work queue
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::Sender<WorkItem>,
    metrics: MetricsCollector,
}

impl WorkQueue {
    /// Wait for a free slot, then append
    pub async fn enqueue(&self, item: WorkItem, source: QueueSource) -> Result<(), QueueError> {
        self.tx.send(item).await.map_err(|_| QueueError::Closed)?;
        self.metrics.record_enqueued(source);
        Ok(())
    }

    /// Like [`enqueue`](Self::enqueue), but give up after `timeout` when one is set
    pub async fn enqueue_within(
        &self,
        item: WorkItem,
        source: QueueSource,
        timeout: Option<Duration>,
    ) -> Result<(), QueueError> {
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.enqueue(item, source))
                .await
                .map_err(|_| QueueError::TimedOut)?,
            None => self.enqueue(item, source).await,
        }
    }

    /// Items currently buffered
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Consumer side of the work queue. There is only ever one.
pub struct WorkReceiver {
    rx: mpsc::Receiver<WorkItem>,
    metrics: MetricsCollector,
}

impl WorkReceiver {
    pub async fn dequeue(&mut self) -> Option<WorkItem> {
        let item = self.rx.recv().await?;
        self.metrics.record_dequeued();
        Some(item)
    }

    /// Refuse further items; buffered ones can still be dequeued
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Counts reported when the dispatcher stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub processed: u64,
    pub abandoned: u64,
}

/// Sequential consumer forwarding queued items to service B
pub struct Dispatcher {
    receiver: WorkReceiver,
    client: RetryingClient,
    drain_on_shutdown: bool,
    metrics: MetricsCollector,
}

impl Dispatcher {
    pub fn new(receiver: WorkReceiver, client: RetryingClient) -> Self {
        Self {
            receiver,
            client,
            drain_on_shutdown: true,
            metrics: MetricsCollector::new(),
        }
    }

    /// Whether items still buffered at shutdown are processed or discarded
    pub fn drain_on_shutdown(mut self, drain: bool) -> Self {
        self.drain_on_shutdown = drain;
        self
    }

    /// Start consuming on a background task
    ///
    /// The dispatcher runs until [`DispatcherHandle::shutdown`] is called,
    /// the handle is dropped, or every producer is gone.
    pub fn spawn(self) -> DispatcherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        DispatcherHandle { shutdown_tx, task }
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        info!(drain_on_shutdown = self.drain_on_shutdown, "Dispatcher started");

        loop {
            // Shutdown is only observed between items; an in-flight call always finishes
            let item = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                item = self.receiver.dequeue() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            self.process(item).await;
            summary.processed += 1;
        }

        self.receiver.close();
        while let Some(item) = self.receiver.dequeue().await {
            if self.drain_on_shutdown {
                self.process(item).await;
                summary.processed += 1;
            } else {
                debug!(item = %item, "Abandoning queued item");
                summary.abandoned += 1;
            }
        }

        if summary.abandoned > 0 {
            warn!(abandoned = summary.abandoned, "Discarded queued items on shutdown");
            self.metrics.record_abandoned(summary.abandoned);
        }
        info!(
            processed = summary.processed,
            abandoned = summary.abandoned,
            "Dispatcher stopped"
        );

        summary
    }

    async fn process(&self, item: WorkItem) {
        info!(item = %item, "Processing item");

        match self.client.post(PROCESS_PATH, item.payload()).await {
            Ok(response) => {
                info!(item = %item, status = response.status, body = %response.body, "Service B responded");
                self.metrics.record_dispatch(if response.is_success() {
                    DispatchOutcome::Success
                } else {
                    DispatchOutcome::FailedResponse
                });
            }
            Err(e) => {
                warn!(item = %item, error = %e, "Call to service B failed");
                self.metrics.record_dispatch(DispatchOutcome::TransportError);
            }
        }
    }
}

/// Owner of a running dispatcher
pub struct DispatcherHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<DispatchSummary>,
}

impl DispatcherHandle {
    /// Stop taking new items, drain or abandon what is buffered, and wait
    /// for the in-flight call to complete
    pub async fn shutdown(self) -> Result<DispatchSummary, DispatcherError> {
        let _ = self.shutdown_tx.send(true);
        self.task
            .await
            .map_err(|e| DispatcherError::Join(e.to_string()))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::retry_policy;
    use crate::downstream::DownstreamResponse;
    use crate::error::TransportError;
    use crate::testing::ScriptedDownstream;
    use backflow_config::RetryConfig;
    use std::sync::Arc;
    use tokio::time::sleep;

    fn dispatcher(receiver: WorkReceiver, downstream: &Arc<ScriptedDownstream>) -> Dispatcher {
        let client = RetryingClient::new(downstream.clone(), retry_policy(&RetryConfig::default()));
        Dispatcher::new(receiver, client)
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_waits_for_free_slot() {
        let (queue, mut receiver) = work_queue(1);
        queue.enqueue(WorkItem::new("a"), QueueSource::Start).await.unwrap();

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.enqueue(WorkItem::new("b"), QueueSource::Start).await })
        };
        sleep(Duration::from_millis(10)).await;
        assert!(!producer.is_finished());

        assert_eq!(receiver.dequeue().await.unwrap().payload(), "a");
        producer.await.unwrap().unwrap();
        assert_eq!(receiver.dequeue().await.unwrap().payload(), "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_within_times_out() {
        let (queue, _receiver) = work_queue(1);
        queue.enqueue(WorkItem::new("a"), QueueSource::Webhook).await.unwrap();

        let result = queue
            .enqueue_within(WorkItem::new("b"), QueueSource::Webhook, Some(Duration::from_secs(1)))
            .await;

        assert_eq!(result, Err(QueueError::TimedOut));
        assert_eq!(queue.depth(), 1);
    }

    #[tokio::test]
    async fn test_closed_queue_keeps_buffered_items() {
        let (queue, mut receiver) = work_queue(2);
        queue.enqueue(WorkItem::new("a"), QueueSource::Start).await.unwrap();
        assert_eq!(queue.depth(), 1);

        receiver.close();
        assert_eq!(
            queue.enqueue(WorkItem::new("b"), QueueSource::Start).await,
            Err(QueueError::Closed)
        );
        assert_eq!(receiver.dequeue().await.unwrap().payload(), "a");
        assert!(receiver.dequeue().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatches_in_fifo_order_one_at_a_time() {
        let downstream = Arc::new(
            ScriptedDownstream::always(DownstreamResponse::new(200))
                .with_latency(Duration::from_secs(1)),
        );
        let (queue, receiver) = work_queue(5);
        for payload in ["task:1", "task:2", "task:3"] {
            queue.enqueue(WorkItem::new(payload), QueueSource::Start).await.unwrap();
        }

        let handle = dispatcher(receiver, &downstream).spawn();
        sleep(Duration::from_millis(3500)).await;

        let calls = downstream.calls();
        assert_eq!(downstream.bodies(), vec!["task:1", "task:2", "task:3"]);
        assert!(calls.iter().all(|c| c.path == PROCESS_PATH));
        // Each call starts only after the previous one answered
        assert!(downstream.gaps().iter().all(|gap| *gap >= Duration::from_secs(1)));

        let summary = handle.shutdown().await.unwrap();
        assert_eq!(summary.processed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_the_loop() {
        let downstream = Arc::new(ScriptedDownstream::new(
            (0..6)
                .map(|_| Err(TransportError::Connect("refused".into())))
                .collect(),
            DownstreamResponse::new(200),
        ));
        let (queue, receiver) = work_queue(5);
        queue.enqueue(WorkItem::new("task:1"), QueueSource::Start).await.unwrap();
        queue.enqueue(WorkItem::new("task:2"), QueueSource::Start).await.unwrap();

        let handle = dispatcher(receiver, &downstream).spawn();
        // 2 + 4 + 8 + 16 + 32 seconds of backoff for the first item
        sleep(Duration::from_secs(70)).await;

        let bodies = downstream.bodies();
        assert_eq!(bodies.len(), 7);
        assert_eq!(bodies.last().map(String::as_str), Some("task:2"));

        let summary = handle.shutdown().await.unwrap();
        assert_eq!(summary.processed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_buffered_items() {
        let downstream = Arc::new(
            ScriptedDownstream::always(DownstreamResponse::new(200))
                .with_latency(Duration::from_secs(1)),
        );
        let (queue, receiver) = work_queue(5);
        let handle = dispatcher(receiver, &downstream).spawn();

        for payload in ["task:1", "task:2", "task:3"] {
            queue.enqueue(WorkItem::new(payload), QueueSource::Start).await.unwrap();
        }
        sleep(Duration::from_millis(100)).await;

        let summary = handle.shutdown().await.unwrap();

        assert_eq!(summary, DispatchSummary { processed: 3, abandoned: 0 });
        assert_eq!(downstream.call_count(), 3);
        assert_eq!(
            queue.enqueue(WorkItem::new("late"), QueueSource::Webhook).await,
            Err(QueueError::Closed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_abandons_but_finishes_in_flight() {
        let downstream = Arc::new(
            ScriptedDownstream::always(DownstreamResponse::new(200))
                .with_latency(Duration::from_secs(5)),
        );
        let (queue, receiver) = work_queue(5);
        let handle = dispatcher(receiver, &downstream)
            .drain_on_shutdown(false)
            .spawn();

        for payload in ["task:1", "task:2", "task:3"] {
            queue.enqueue(WorkItem::new(payload), QueueSource::Start).await.unwrap();
        }
        sleep(Duration::from_millis(100)).await;
        assert_eq!(downstream.call_count(), 1);

        let started = tokio::time::Instant::now();
        let summary = handle.shutdown().await.unwrap();

        // The in-flight call was awaited, the rest discarded
        assert!(started.elapsed() >= Duration::from_millis(4900));
        assert_eq!(summary, DispatchSummary { processed: 1, abandoned: 2 });
        assert_eq!(downstream.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_producers_are_gone() {
        let downstream = Arc::new(ScriptedDownstream::always(DownstreamResponse::new(200)));
        let (queue, receiver) = work_queue(5);
        let handle = dispatcher(receiver, &downstream).spawn();

        queue.enqueue(WorkItem::new("task:1"), QueueSource::Start).await.unwrap();
        drop(queue);
        sleep(Duration::from_millis(10)).await;

        assert!(handle.is_finished());
        assert_eq!(handle.shutdown().await.unwrap().processed, 1);
    }
}
