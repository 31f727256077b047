//! Background flush worker.
//!
//! A single worker task owns the batch collector; producers only touch the
//! channel. Flushes fire on the size threshold (checked at enqueue) or on
//! the interval tick, whichever comes first. The collector is only ever
//! held between awaits, never across a backend write.

use crate::batch::BatchCollector;
use crate::logger::AuditLoggerConfig;
use crate::overflow::OverflowLog;
use crate::router::StorageRouter;
use crate::IngestError;
use chronicle_types::AuditEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

/// Messages consumed by the ingest worker.
pub enum IngestMessage {
    /// A normalized event to buffer.
    Event(AuditEvent),
    /// Force an out-of-band flush and ack once the batch is durable.
    Flush(oneshot::Sender<Result<(), IngestError>>),
    /// Final drain-and-flush, then stop.
    Shutdown(oneshot::Sender<()>),
}

/// Secondary-backend retry queues are bounded; beyond this many batches the
/// oldest is dropped (the data is already durable in the primary store).
const SECONDARY_RETRY_CAP: usize = 64;

pub(crate) struct IngestWorker {
    router: StorageRouter,
    collector: BatchCollector,
    overflow: OverflowLog,
    max_flush_retries: u32,
    retry_delay: Duration,
    tick_interval: Duration,
    consecutive_failures: u32,
    search_retry: VecDeque<(Vec<AuditEvent>, u32)>,
    cache_retry: VecDeque<(Vec<AuditEvent>, u32)>,
    pending_depth: Arc<AtomicUsize>,
}

impl IngestWorker {
    pub(crate) fn new(
        router: StorageRouter,
        config: &AuditLoggerConfig,
        pending_depth: Arc<AtomicUsize>,
    ) -> Self {
        let tick_interval = (config.batch.batch_interval / 2).max(Duration::from_millis(10));
        Self {
            router,
            collector: BatchCollector::new(config.batch.clone()),
            overflow: OverflowLog::new(config.overflow_path.clone()),
            max_flush_retries: config.max_flush_retries,
            retry_delay: config.retry_delay,
            tick_interval,
            consecutive_failures: 0,
            search_retry: VecDeque::new(),
            cache_retry: VecDeque::new(),
            pending_depth,
        }
    }

    pub(crate) async fn run(mut self, mut receiver: mpsc::Receiver<IngestMessage>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = receiver.recv() => match message {
                    Some(IngestMessage::Event(event)) => {
                        if let Some(batch) = self.collector.add(event) {
                            debug!(count = batch.len(), "Flushing batch (size limit)");
                            self.flush(batch.events).await;
                        }
                        self.publish_depth();
                    }
                    Some(IngestMessage::Flush(ack)) => {
                        let result = self.force_flush().await;
                        self.publish_depth();
                        let _ = ack.send(result);
                    }
                    Some(IngestMessage::Shutdown(ack)) => {
                        let _ = self.force_flush().await;
                        self.retry_secondaries().await;
                        self.publish_depth();
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        // All senders dropped; drain what is left.
                        let _ = self.force_flush().await;
                        self.publish_depth();
                        break;
                    }
                },
                _ = interval.tick() => {
                    if self.collector.is_due() {
                        let batch = self.collector.take_batch();
                        debug!(count = batch.len(), "Flushing batch (time limit)");
                        self.flush(batch.events).await;
                        self.publish_depth();
                    }
                    self.retry_secondaries().await;
                }
            }
        }
    }

    /// One flush attempt. On primary failure the batch is re-fronted for the
    /// next tick; once the retry budget is exhausted it goes to the overflow
    /// log instead.
    async fn flush(&mut self, events: Vec<AuditEvent>) {
        if events.is_empty() {
            return;
        }

        let outcome = self.router.route(&events).await;
        self.queue_secondary_retries(&events, outcome.search.is_some_and(|r| r.is_err()),
            outcome.cache.is_some_and(|r| r.is_err()));

        match outcome.primary {
            Ok(_) => {
                self.consecutive_failures = 0;
            }
            Err(_) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures > self.max_flush_retries {
                    match self.overflow.append_batch(&events).await {
                        Ok(_) => self.consecutive_failures = 0,
                        Err(e) => {
                            // Overflow unwritable: keep the events buffered
                            // rather than lose them.
                            error!(error = %e, "Overflow log write failed; keeping batch buffered");
                            self.collector.requeue(events);
                        }
                    }
                } else {
                    self.collector.requeue(events);
                }
            }
        }
    }

    /// Flush everything buffered and wait for durability, retrying inline.
    async fn force_flush(&mut self) -> Result<(), IngestError> {
        if !self.collector.has_pending() {
            return Ok(());
        }
        let events = self.collector.take_batch().events;

        let outcome = self.router.route(&events).await;
        self.queue_secondary_retries(&events, outcome.search.is_some_and(|r| r.is_err()),
            outcome.cache.is_some_and(|r| r.is_err()));
        if outcome.primary.is_ok() {
            self.consecutive_failures = 0;
            return Ok(());
        }

        let mut attempt = 1;
        loop {
            if attempt > self.max_flush_retries {
                return match self.overflow.append_batch(&events).await {
                    Ok(_) => Err(IngestError::RetriesExhausted),
                    Err(e) => {
                        self.collector.requeue(events);
                        Err(IngestError::FlushFailed(e.to_string()))
                    }
                };
            }
            tokio::time::sleep(self.retry_delay).await;
            match self.router.write_primary(&events).await {
                Ok(_) => {
                    self.consecutive_failures = 0;
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Forced flush retry failed");
                    attempt += 1;
                }
            }
        }
    }

    fn queue_secondary_retries(
        &mut self,
        events: &[AuditEvent],
        search_failed: bool,
        cache_failed: bool,
    ) {
        if search_failed {
            push_bounded(&mut self.search_retry, events.to_vec(), "search");
        }
        if cache_failed {
            push_bounded(&mut self.cache_retry, events.to_vec(), "cache");
        }
    }

    /// Retry one queued batch per secondary backend. Already-successful
    /// backends never see the batch again.
    async fn retry_secondaries(&mut self) {
        if let Some((events, attempts)) = self.search_retry.pop_front() {
            match self.router.write_search(&events).await {
                Ok(()) => debug!(count = events.len(), "Search index retry succeeded"),
                Err(e) if attempts + 1 < self.max_flush_retries => {
                    warn!(error = %e, attempts = attempts + 1, "Search index retry failed");
                    self.search_retry.push_back((events, attempts + 1));
                }
                Err(e) => {
                    warn!(error = %e, count = events.len(),
                        "Dropping search index batch after exhausting retries");
                }
            }
        }
        if let Some((events, attempts)) = self.cache_retry.pop_front() {
            match self.router.write_cache(&events).await {
                Ok(()) => debug!(count = events.len(), "Cache retry succeeded"),
                Err(e) if attempts + 1 < self.max_flush_retries => {
                    warn!(error = %e, attempts = attempts + 1, "Cache retry failed");
                    self.cache_retry.push_back((events, attempts + 1));
                }
                Err(e) => {
                    warn!(error = %e, count = events.len(),
                        "Dropping cache batch after exhausting retries");
                }
            }
        }
    }

    fn publish_depth(&self) {
        self.pending_depth
            .store(self.collector.pending_len(), Ordering::Relaxed);
    }
}

fn push_bounded(
    queue: &mut VecDeque<(Vec<AuditEvent>, u32)>,
    events: Vec<AuditEvent>,
    backend: &str,
) {
    if queue.len() >= SECONDARY_RETRY_CAP {
        warn!(backend, "Secondary retry queue full; dropping oldest batch");
        queue.pop_front();
    }
    queue.push_back((events, 0));
}
