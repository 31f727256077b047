//! Batch event collection for efficient persistence.

use chronicle_types::AuditEvent;
use std::time::{Duration, Instant};

/// Configuration for batch collection.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum events per batch.
    pub batch_size: usize,
    /// Maximum time to wait before flushing a partial batch.
    pub batch_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_interval: Duration::from_secs(5),
        }
    }
}

/// Collected batch of events.
#[derive(Debug)]
pub struct EventBatch {
    pub events: Vec<AuditEvent>,
    pub collected_at: Instant,
}

impl EventBatch {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            collected_at: Instant::now(),
        }
    }

    fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

/// Batch collector that aggregates events.
pub struct BatchCollector {
    config: BatchConfig,
    current_batch: EventBatch,
    retry_pending: bool,
}

impl BatchCollector {
    /// Create a new collector.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            current_batch: EventBatch::new(),
            retry_pending: false,
        }
    }

    /// Add an event to the current batch.
    /// Returns Some(batch) if the batch is ready to flush.
    pub fn add(&mut self, event: AuditEvent) -> Option<EventBatch> {
        self.current_batch.events.push(event);

        if self.current_batch.len() >= self.config.batch_size {
            Some(self.take_batch())
        } else {
            None
        }
    }

    /// Return a failed batch to the front of the buffer, preserving order.
    /// The re-fronted events are immediately due for retry on the next tick.
    pub fn requeue(&mut self, mut events: Vec<AuditEvent>) {
        std::mem::swap(&mut events, &mut self.current_batch.events);
        self.current_batch.events.extend(events);
        self.retry_pending = true;
    }

    /// Check if the batch is due based on age alone.
    pub fn is_due(&self) -> bool {
        !self.current_batch.is_empty()
            && (self.retry_pending
                || self.current_batch.collected_at.elapsed() >= self.config.batch_interval)
    }

    /// Take the current batch and reset.
    pub fn take_batch(&mut self) -> EventBatch {
        self.retry_pending = false;
        std::mem::replace(&mut self.current_batch, EventBatch::new())
    }

    /// Check if there are pending events.
    pub fn has_pending(&self) -> bool {
        !self.current_batch.is_empty()
    }

    /// Number of buffered events not yet flushed.
    pub fn pending_len(&self) -> usize {
        self.current_batch.len()
    }
}
