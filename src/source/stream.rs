//! Record-stream change source.
//!
//! Reads newline-delimited `owner|path` records from a non-blocking
//! channel (a named pipe, typically). The stream is shared by every
//! operator on the host, so records for other owners are an expected
//! sight and are dropped quietly, not logged as errors.

use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, trace};

use crate::arrivals::{ArrivalEvent, ArrivalQueue};
use crate::identity::OperatorId;
use crate::source::ChangeSource;

/// Polls a readable channel for `owner|path` records addressed to one
/// operator.
///
/// Partial lines are accumulated across reads; a record is forwarded only
/// when its terminating newline has been seen and its owner matches.
pub struct RecordStream<R> {
    reader: R,
    owner: OperatorId,
    interval: Duration,
    pending: String,
}

impl<R: Read + Send> RecordStream<R> {
    /// Create a stream for `owner`, polling `reader` every `interval`.
    ///
    /// `reader` should be in non-blocking mode; reads that would block are
    /// treated as "nothing new yet", not as failures.
    pub fn new(reader: R, owner: OperatorId, interval: Duration) -> Self {
        Self {
            reader,
            owner,
            interval,
            pending: String::new(),
        }
    }

    fn drain_records(&mut self, queue: &ArrivalQueue) {
        while let Some(newline) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=newline).collect();
            match parse_record(line.trim_end()) {
                Some((owner, path)) => {
                    if owner == self.owner.as_str() {
                        queue.put(ArrivalEvent::new(path));
                    } else {
                        // Another tenant's record; expected, drop quietly.
                        trace!(owner, "dropping record for another owner");
                    }
                }
                None => {
                    if !line.trim().is_empty() {
                        debug!(line = line.trim_end(), "discarding malformed record");
                    }
                }
            }
        }
    }
}

/// Split one record line into `(owner, path)`; `None` when the delimiter
/// is missing or either side is empty.
fn parse_record(line: &str) -> Option<(&str, PathBuf)> {
    let (owner, path) = line.split_once('|')?;
    let owner = owner.trim();
    let path = path.trim();
    if owner.is_empty() || path.is_empty() {
        return None;
    }
    Some((owner, PathBuf::from(path)))
}

impl<R: Read + Send> ChangeSource for RecordStream<R> {
    fn name(&self) -> &str {
        "record-stream"
    }

    fn run(&mut self, queue: &ArrivalQueue, stop: &AtomicBool) {
        info!(owner = %self.owner, "record stream starting");
        let mut chunk = [0u8; 4096];
        while !stop.load(Ordering::SeqCst) {
            match self.reader.read(&mut chunk) {
                Ok(0) => thread::sleep(self.interval),
                Ok(n) => {
                    self.pending
                        .push_str(&String::from_utf8_lossy(&chunk[..n]));
                    self.drain_records(queue);
                }
                Err(error)
                    if error.kind() == ErrorKind::WouldBlock
                        || error.kind() == ErrorKind::Interrupted =>
                {
                    // Nothing to read yet; poll again next tick.
                    thread::sleep(self.interval);
                }
                Err(error) => {
                    error!(%error, "record stream read failed");
                    thread::sleep(self.interval);
                }
            }
        }
        info!(owner = %self.owner, "record stream terminating");
    }
}
