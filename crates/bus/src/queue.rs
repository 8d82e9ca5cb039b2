//! Bounded, single-producer single-consumer event queue with a drop-oldest
//! overflow policy.
//!
//! Backed by `crossbeam::queue::ArrayQueue`, a lock-free ring buffer. The
//! queue models true SPSC usage: exactly one task publishes, exactly one
//! task consumes. Under that contract drop-oldest is unambiguous; nothing
//! here attempts to be correct under concurrent producers or consumers.

use crossbeam::queue::ArrayQueue;
use hft_common::Ts;
use std::sync::atomic::{AtomicU64, Ordering};

struct Envelope<T> {
    item: T,
    enqueued_ns: u64,
}

/// Snapshot of queue health, exposed to the dashboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub published: u64,
    pub consumed: u64,
    pub overflow_count: u64,
    pub total_latency_ns: u64,
    pub max_latency_ns: u64,
    pub depth: usize,
}

impl QueueStats {
    #[must_use]
    pub fn avg_latency_ns(&self) -> f64 {
        if self.consumed == 0 {
            0.0
        } else {
            self.total_latency_ns as f64 / self.consumed as f64
        }
    }
}

/// Bounded drop-oldest event queue.
pub struct EventQueue<T> {
    ring: ArrayQueue<Envelope<T>>,
    capacity: usize,
    published: AtomicU64,
    consumed: AtomicU64,
    overflow_count: AtomicU64,
    total_latency_ns: AtomicU64,
    max_latency_ns: AtomicU64,
}

impl<T> EventQueue<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: ArrayQueue::new(capacity),
            capacity,
            published: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
            overflow_count: AtomicU64::new(0),
            total_latency_ns: AtomicU64::new(0),
            max_latency_ns: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `item`. If the ring is full, the oldest entry is dropped
    /// first and `overflow_count` is incremented.
    pub fn publish(&self, item: T) {
        let envelope = Envelope {
            item,
            enqueued_ns: Ts::now().as_nanos(),
        };
        if let Err(envelope) = self.ring.push(envelope) {
            // Full: drop the oldest entry, then the new one always fits
            // because we are the sole producer and the ring stays at
            // capacity - 1 immediately afterward.
            let _dropped = self.ring.pop();
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
            // Safe to ignore a second failure: a concurrent consumer pop
            // raced us, which only means the ring had room after all.
            let _ = self.ring.push(envelope);
        }
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes up to `max_items` entries in FIFO order, recording the
    /// enqueue-to-dequeue latency of each.
    pub fn consume_batch(&self, max_items: usize) -> Vec<T> {
        let mut out = Vec::with_capacity(max_items.min(self.capacity));
        let now = Ts::now().as_nanos();
        for _ in 0..max_items {
            let Some(envelope) = self.ring.pop() else {
                break;
            };
            let latency = now.saturating_sub(envelope.enqueued_ns);
            self.total_latency_ns.fetch_add(latency, Ordering::Relaxed);
            self.max_latency_ns.fetch_max(latency, Ordering::Relaxed);
            self.consumed.fetch_add(1, Ordering::Relaxed);
            out.push(envelope.item);
        }
        out
    }

    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            published: self.published.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            overflow_count: self.overflow_count.load(Ordering::Relaxed),
            total_latency_ns: self.total_latency_ns.load(Ordering::Relaxed),
            max_latency_ns: self.max_latency_ns.load(Ordering::Relaxed),
            depth: self.ring.len(),
        }
    }

    pub fn reset_stats(&self) {
        self.published.store(0, Ordering::Relaxed);
        self.consumed.store(0, Ordering::Relaxed);
        self.overflow_count.store(0, Ordering::Relaxed);
        self.total_latency_ns.store(0, Ordering::Relaxed);
        self.max_latency_ns.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_within_capacity() {
        let q: EventQueue<i32> = EventQueue::new(4);
        q.publish(1);
        q.publish(2);
        q.publish(3);
        assert_eq!(q.consume_batch(3), vec![1, 2, 3]);
    }

    #[test]
    fn overflow_drops_oldest() {
        // Capacity=4. Publish E1..E5 without consuming, then consume 4.
        let q: EventQueue<i32> = EventQueue::new(4);
        for i in 1..=5 {
            q.publish(i);
        }
        let drained = q.consume_batch(4);
        assert_eq!(drained, vec![2, 3, 4, 5]);
        assert_eq!(q.stats().overflow_count, 1);
    }

    #[test]
    fn consume_batch_caps_at_max_items() {
        let q: EventQueue<i32> = EventQueue::new(8);
        for i in 0..8 {
            q.publish(i);
        }
        let first = q.consume_batch(3);
        assert_eq!(first.len(), 3);
        assert_eq!(q.stats().depth, 5);
    }

    #[test]
    fn stats_track_published_and_consumed() {
        let q: EventQueue<i32> = EventQueue::new(4);
        q.publish(1);
        q.publish(2);
        let _ = q.consume_batch(1);
        let stats = q.stats();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.consumed, 1);
    }
}
