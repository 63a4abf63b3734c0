//! The FIFO buffer between change sources and the ingestion worker.
//!
//! `put` never blocks (the queue grows without bound rather than stalling a
//! change source), and `get` takes a timeout so the consumer can observe the
//! shared stop flag at bounded latency even when nothing arrives.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Notification that a new data file is available for ingestion.
#[derive(Clone, Debug, Serialize)]
pub struct ArrivalEvent {
    /// Filesystem path of the arrived file.
    pub source_path: PathBuf,
    /// When the notification was produced.
    pub received_at: DateTime<Utc>,
}

impl ArrivalEvent {
    /// Create an event for `path`, stamped with the current time.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: path.into(),
            received_at: Utc::now(),
        }
    }
}

/// Thread-safe FIFO of arrival events.
pub struct ArrivalQueue {
    items: Mutex<VecDeque<ArrivalEvent>>,
    ready: Condvar,
}

impl ArrivalQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    /// Append `event`, waking one waiting consumer. Never blocks.
    pub fn put(&self, event: ArrivalEvent) {
        let mut items = self.items.lock().expect("arrival queue poisoned");
        items.push_back(event);
        self.ready.notify_one();
    }

    /// Pop the oldest event, waiting up to `timeout` for one to arrive.
    pub fn get_timeout(&self, timeout: Duration) -> Option<ArrivalEvent> {
        let deadline = Instant::now() + timeout;
        let mut items = self.items.lock().expect("arrival queue poisoned");
        loop {
            if let Some(event) = items.pop_front() {
                return Some(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _result) = self
                .ready
                .wait_timeout(items, deadline - now)
                .expect("arrival queue poisoned");
            items = guard;
        }
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.items.lock().expect("arrival queue poisoned").len()
    }

    /// Returns `true` when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ArrivalQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn get_preserves_fifo_order() {
        let queue = ArrivalQueue::new();
        queue.put(ArrivalEvent::new("/d/a.fits"));
        queue.put(ArrivalEvent::new("/d/b.fits"));

        let first = queue.get_timeout(Duration::from_millis(10)).unwrap();
        let second = queue.get_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(first.source_path, PathBuf::from("/d/a.fits"));
        assert_eq!(second.source_path, PathBuf::from("/d/b.fits"));
        assert!(queue.is_empty());
    }

    #[test]
    fn get_times_out_when_empty() {
        let queue = ArrivalQueue::new();
        let started = Instant::now();
        assert!(queue.get_timeout(Duration::from_millis(30)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn put_wakes_a_blocked_consumer() {
        let queue = Arc::new(ArrivalQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.get_timeout(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        queue.put(ArrivalEvent::new("/d/c.fits"));

        let got = consumer.join().unwrap().unwrap();
        assert_eq!(got.source_path, PathBuf::from("/d/c.fits"));
    }
}
