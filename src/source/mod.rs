//! Change sources: producers of arrival notifications.
//!
//! Two interchangeable implementations feed the same queue contract: a
//! filesystem watcher ([`DirectoryWatcher`]) and a non-blocking record
//! stream reader ([`RecordStream`]). A change source never terminates the
//! process: survivable I/O failures are logged and the loop continues.

use std::sync::atomic::AtomicBool;

use crate::arrivals::ArrivalQueue;

mod stream;
mod watcher;

pub use stream::RecordStream;
pub use watcher::DirectoryWatcher;

/// A producer of [`crate::arrivals::ArrivalEvent`]s.
///
/// `run` is the whole lifetime of the source: it loops, feeding `queue`,
/// until `stop` is set, checking the flag at least once per poll interval.
pub trait ChangeSource: Send {
    /// Short name used for the worker thread and log lines.
    fn name(&self) -> &str;

    /// Produce events into `queue` until `stop` is set.
    fn run(&mut self, queue: &ArrivalQueue, stop: &AtomicBool);
}
