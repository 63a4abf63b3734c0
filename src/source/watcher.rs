//! Filesystem change source built on `notify`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use notify::event::{AccessKind, AccessMode, EventKind, ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info, warn};

use crate::arrivals::{ArrivalEvent, ArrivalQueue};
use crate::source::ChangeSource;

/// Watches a directory tree and emits one arrival per completed file.
///
/// Only write-complete and moved-into-place notifications become arrivals;
/// every other event kind is ignored. The watch survives its target
/// disappearing: it is re-armed each tick until the directory exists again,
/// without restarting the owning process.
pub struct DirectoryWatcher {
    dir: PathBuf,
    tick: Duration,
}

impl DirectoryWatcher {
    /// Watch `dir`, checking the stop flag every `tick`.
    pub fn new(dir: impl Into<PathBuf>, tick: Duration) -> Self {
        Self {
            dir: dir.into(),
            tick,
        }
    }
}

fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}

/// Whether `event` reports the watched directory itself being deleted or
/// renamed away.
fn target_vanished(event: &notify::Event, dir: &std::path::Path) -> bool {
    matches!(
        event.kind,
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From))
    ) && event.paths.iter().any(|path| path == dir)
}

impl ChangeSource for DirectoryWatcher {
    fn name(&self) -> &str {
        "directory-watcher"
    }

    fn run(&mut self, queue: &ArrivalQueue, stop: &AtomicBool) {
        let (tx, rx) = mpsc::channel();
        let mut watcher = match RecommendedWatcher::new(tx, NotifyConfig::default()) {
            Ok(watcher) => watcher,
            Err(error) => {
                error!(%error, "could not initialize filesystem watcher");
                return;
            }
        };

        info!(dir = %self.dir.display(), "directory watcher starting");
        let mut watching = false;
        while !stop.load(Ordering::SeqCst) {
            if !watching {
                match watcher.watch(&self.dir, RecursiveMode::Recursive) {
                    Ok(()) => {
                        debug!(dir = %self.dir.display(), "watch armed");
                        watching = true;
                    }
                    Err(error) => {
                        debug!(dir = %self.dir.display(), %error, "watch target unavailable, retrying");
                        thread::sleep(self.tick);
                        continue;
                    }
                }
            }

            match rx.recv_timeout(self.tick) {
                Ok(Ok(event)) => {
                    if target_vanished(&event, &self.dir) {
                        // The watch still points at the dead inode; a
                        // recreated directory needs a fresh watch.
                        warn!(dir = %self.dir.display(), "watch target removed, re-arming");
                        let _ = watcher.unwatch(&self.dir);
                        watching = false;
                        continue;
                    }
                    if !is_arrival(&event.kind) {
                        continue;
                    }
                    for path in event.paths {
                        if path.is_file() {
                            queue.put(ArrivalEvent::new(path));
                        }
                    }
                }
                Ok(Err(error)) => {
                    // Watch handles can go stale when the target is removed;
                    // drop and re-arm rather than giving up.
                    warn!(%error, "watch error, re-arming");
                    let _ = watcher.unwatch(&self.dir);
                    watching = false;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if watching && !self.dir.is_dir() {
                        warn!(dir = %self.dir.display(), "watch target vanished, re-arming");
                        let _ = watcher.unwatch(&self.dir);
                        watching = false;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!(dir = %self.dir.display(), "directory watcher terminating");
    }
}
