//! The display-affinity executor.
//!
//! One named thread owns the whole [`ViewerState`]; every other thread
//! interacts with display state only by submitting closures here. Tasks run
//! strictly in submission order, one at a time, so submitted mutations never
//! interleave.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::display::ViewerState;
use crate::errors::FlowError;
use crate::promise::Deferred;

/// A unit of work executed on the display thread.
pub type DisplayTask = Box<dyn FnOnce(&mut ViewerState) + Send + 'static>;

/// Cheap cloneable handle used by workers and the dispatcher to submit work.
#[derive(Clone)]
pub struct DisplaySubmitter {
    tx: Sender<DisplayTask>,
}

impl DisplaySubmitter {
    /// Fire-and-forget submission: run `task` on the display thread; the
    /// caller observes no result.
    pub fn submit(&self, task: impl FnOnce(&mut ViewerState) + Send + 'static) {
        if self.tx.send(Box::new(task)).is_err() {
            warn!("display executor is gone, dropping submitted task");
        }
    }

    /// Run `task` on the display thread and resolve `handle` with its
    /// return value or a captured failure. Never blocks the caller.
    pub fn call_with_handle<T>(
        &self,
        handle: Deferred<Result<T, String>>,
        task: impl FnOnce(&mut ViewerState) -> Result<T, FlowError> + Send + 'static,
    ) where
        T: Clone + Send + 'static,
    {
        self.submit(move |state| {
            let outcome = task(state).map_err(|error| error.to_string());
            handle.resolve(outcome);
        });
    }
}

/// Owner of the display thread.
///
/// Created with [`DisplayExecutor::start`] and shut down with
/// [`DisplayExecutor::stop`]; the thread exits within one `tick` of the stop
/// flag being set even if no tasks arrive.
pub struct DisplayExecutor {
    submitter: DisplaySubmitter,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DisplayExecutor {
    /// Spawn the display thread with empty state.
    pub fn start(tick: Duration) -> Result<Self, FlowError> {
        let (tx, rx) = mpsc::channel::<DisplayTask>();
        let stop = Arc::new(AtomicBool::new(false));
        let loop_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("display-executor".to_string())
            .spawn(move || {
                debug!("display executor starting");
                let mut state = ViewerState::new();
                while !loop_stop.load(Ordering::SeqCst) {
                    match rx.recv_timeout(tick) {
                        Ok(task) => task(&mut state),
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("display executor terminating");
            })?;

        Ok(Self {
            submitter: DisplaySubmitter { tx },
            stop,
            handle: Some(handle),
        })
    }

    /// A cloneable submission handle for this executor.
    pub fn submitter(&self) -> DisplaySubmitter {
        self.submitter.clone()
    }

    /// Fire-and-forget submission; see [`DisplaySubmitter::submit`].
    pub fn submit(&self, task: impl FnOnce(&mut ViewerState) + Send + 'static) {
        self.submitter.submit(task);
    }

    /// Run a read-only probe on the display thread and wait for its answer.
    ///
    /// The probe queues behind previously submitted tasks, so the returned
    /// snapshot reflects every earlier submission. Returns `None` once the
    /// executor has stopped.
    pub fn inspect<R>(&self, probe: impl FnOnce(&ViewerState) -> R + Send + 'static) -> Option<R>
    where
        R: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.submitter.submit(move |state| {
            let _ = tx.send(probe(state));
        });
        rx.recv().ok()
    }

    /// Signal the display thread to exit and wait for it.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DisplayExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}
