//! Console wiring and lifecycle.
//!
//! `AnalysisConsole` assembles the whole event-flow core: identity
//! resolution (fatal on failure), the arrival queue, the display executor,
//! the command dispatcher, and whatever change sources the host registers.
//! The host drives it through the explicit [`Lifecycle`] interface instead
//! of subclassing anything.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{info, warn};

use crate::arrivals::{ArrivalEvent, ArrivalQueue};
use crate::config::ConsoleConfig;
use crate::dispatch::{CommandDispatcher, MethodTable};
use crate::errors::FlowError;
use crate::executor::DisplayExecutor;
use crate::frame::{FrameParser, ObsFrameParser};
use crate::identity::OperatorId;
use crate::ingest::IngestionWorker;
use crate::publish::{ResultHub, ResultPublisher};
use crate::source::{ChangeSource, DirectoryWatcher};

/// Explicit start/stop interface between the host application and a
/// long-running component.
pub trait Lifecycle {
    /// Bring the component up; spawns background threads.
    fn start(&mut self) -> Result<(), FlowError>;

    /// Signal every background loop to exit and wait for them.
    fn stop(&mut self);
}

/// The assembled event-flow core for one operator.
pub struct AnalysisConsole {
    operator: OperatorId,
    service_name: String,
    data_dir: PathBuf,
    queue_timeout: Duration,
    poll_interval: Duration,
    queue: Arc<ArrivalQueue>,
    executor: DisplayExecutor,
    dispatcher: Arc<CommandDispatcher>,
    parser: Arc<dyn FrameParser>,
    stop: Arc<AtomicBool>,
    sources: Vec<Box<dyn ChangeSource>>,
    threads: Vec<JoinHandle<()>>,
    running: bool,
    stopped: bool,
}

impl AnalysisConsole {
    /// Build a console from `config`, publishing dispatch results to `hub`
    /// and serving the `methods` allow-list.
    ///
    /// Identity resolution failure is fatal here: a console without an
    /// operator must not come up.
    pub fn new(
        config: &ConsoleConfig,
        hub: Arc<dyn ResultHub>,
        methods: MethodTable,
    ) -> Result<Self, FlowError> {
        let operator = OperatorId::resolve(config)?;
        let service_name = format!("{}-{}", config.target, operator);
        info!(%operator, service = %service_name, "resolved operator identity");

        let executor = DisplayExecutor::start(config.queue_timeout)?;
        let publisher = ResultPublisher::new(hub, config.channel_group.clone());
        let dispatcher = Arc::new(CommandDispatcher::new(
            config.target.clone(),
            methods,
            executor.submitter(),
            publisher,
        ));
        let parser: Arc<dyn FrameParser> =
            Arc::new(ObsFrameParser::new(config.multi_detector.clone()));

        Ok(Self {
            operator,
            service_name,
            data_dir: config.data_dir.clone(),
            queue_timeout: config.queue_timeout,
            poll_interval: config.poll_interval,
            queue: Arc::new(ArrivalQueue::new()),
            executor,
            dispatcher,
            parser,
            stop: Arc::new(AtomicBool::new(false)),
            sources: Vec::new(),
            threads: Vec::new(),
            running: false,
            stopped: false,
        })
    }

    /// The resolved operator identity.
    pub fn operator(&self) -> &OperatorId {
        &self.operator
    }

    /// Service name this console registers under, `{target}-{operator}`.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The remote-call entry point.
    pub fn dispatcher(&self) -> Arc<CommandDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// The display executor, for read-only probes and host-side submissions.
    pub fn executor(&self) -> &DisplayExecutor {
        &self.executor
    }

    /// Replace the default frame parser. Takes effect for workers spawned
    /// by a later [`Lifecycle::start`].
    pub fn set_parser(&mut self, parser: Arc<dyn FrameParser>) {
        self.parser = parser;
    }

    /// Register a change source to be spawned on start.
    pub fn add_source(&mut self, source: Box<dyn ChangeSource>) {
        self.sources.push(source);
    }

    /// Register a watcher on the configured data directory.
    pub fn watch_data_dir(&mut self) {
        let watcher = DirectoryWatcher::new(self.data_dir.clone(), self.poll_interval);
        self.add_source(Box::new(watcher));
    }

    /// Feed one externally produced arrival notification into the pipeline.
    pub fn handle_event(&self, event: ArrivalEvent) {
        self.queue.put(event);
    }
}

impl Lifecycle for AnalysisConsole {
    fn start(&mut self) -> Result<(), FlowError> {
        if self.running {
            warn!("console already running, ignoring start");
            return Ok(());
        }
        // The stop flag and the executor thread are spent after stop();
        // a console is single-use.
        if self.stopped {
            return Err(FlowError::Configuration(
                "console cannot be restarted after stop; build a new one".to_string(),
            ));
        }

        let worker = IngestionWorker::new(
            Arc::clone(&self.queue),
            self.executor.submitter(),
            Arc::clone(&self.parser),
            Arc::clone(&self.stop),
            self.queue_timeout,
        );
        self.threads.push(worker.spawn()?);

        for mut source in self.sources.drain(..) {
            let queue = Arc::clone(&self.queue);
            let stop = Arc::clone(&self.stop);
            let handle = std::thread::Builder::new()
                .name(source.name().to_string())
                .spawn(move || source.run(&queue, &stop))?;
            self.threads.push(handle);
        }

        self.running = true;
        info!(service = %self.service_name, "analysis console started");
        Ok(())
    }

    fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
        // In-flight dispatch calls are not cancelled; completion handles
        // that were never resolved are simply abandoned here.
        self.executor.stop();
        self.running = false;
        self.stopped = true;
        info!(service = %self.service_name, "analysis console stopped");
    }
}

impl Drop for AnalysisConsole {
    fn drop(&mut self) {
        self.stop();
    }
}
