//! The ingestion worker: queue drain, parse, schedule for display.
//!
//! One item failing to parse must never stop the loop; only the shared stop
//! flag ends it, and that is observed within one queue timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::arrivals::{ArrivalEvent, ArrivalQueue};
use crate::display::DisplayRecord;
use crate::errors::FlowError;
use crate::executor::DisplaySubmitter;
use crate::frame::FrameParser;

/// Drains the arrival queue and schedules display mutations.
pub struct IngestionWorker {
    queue: Arc<ArrivalQueue>,
    submitter: DisplaySubmitter,
    parser: Arc<dyn FrameParser>,
    stop: Arc<AtomicBool>,
    timeout: Duration,
}

impl IngestionWorker {
    /// Create a worker; `timeout` bounds each blocking `get` so the stop
    /// flag is observed promptly.
    pub fn new(
        queue: Arc<ArrivalQueue>,
        submitter: DisplaySubmitter,
        parser: Arc<dyn FrameParser>,
        stop: Arc<AtomicBool>,
        timeout: Duration,
    ) -> Self {
        Self {
            queue,
            submitter,
            parser,
            stop,
            timeout,
        }
    }

    /// Run the drain loop until the stop flag is set.
    pub fn run(&self) {
        info!("ingestion worker starting");
        while !self.stop.load(Ordering::SeqCst) {
            let Some(event) = self.queue.get_timeout(self.timeout) else {
                continue;
            };
            if let Err(error) = self.ingest(&event) {
                warn!(
                    path = %event.source_path.display(),
                    %error,
                    "skipping arrival"
                );
            }
        }
        info!("ingestion worker terminating");
    }

    /// Spawn the worker on its own named thread.
    pub fn spawn(self) -> Result<JoinHandle<()>, FlowError> {
        let handle = thread::Builder::new()
            .name("ingestion-worker".to_string())
            .spawn(move || self.run())?;
        Ok(handle)
    }

    fn ingest(&self, event: &ArrivalEvent) -> Result<(), FlowError> {
        let frame = self.parser.parse(&event.source_path)?;
        let key = self.parser.grouping_key(&frame);
        debug!(frame = %frame.frame_id, grouping = %key, "scheduling arrival for display");

        let record = DisplayRecord {
            frame_id: frame.frame_id,
            source_path: event.source_path.clone(),
            received_at: event.received_at,
        };
        self.submitter.submit(move |state| {
            state.insert_record(&key, record);
        });
        Ok(())
    }
}
