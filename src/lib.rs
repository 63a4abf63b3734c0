#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Arrival events and the FIFO queue between sources and the worker.
pub mod arrivals;
/// Console configuration, constructed once at startup.
pub mod config;
/// Console wiring and the start/stop lifecycle.
pub mod console;
/// Remote-command dispatch and the two-handle completion protocol.
pub mod dispatch;
/// Grouping and display-record state owned by the executor.
pub mod display;
/// The display-affinity executor thread.
pub mod executor;
/// Frame filename parsing and grouping-key derivation.
pub mod frame;
/// Operator identity resolution.
pub mod identity;
/// The queue-draining ingestion worker.
pub mod ingest;
/// Single-resolution deferred values.
pub mod promise;
/// Result publication to the pub/sub hub.
pub mod publish;
/// Change sources: filesystem watcher and record-stream reader.
pub mod source;
/// Shared type aliases.
pub mod types;

mod errors;

pub use arrivals::{ArrivalEvent, ArrivalQueue};
pub use config::ConsoleConfig;
pub use console::{AnalysisConsole, Lifecycle};
pub use dispatch::{CallContext, CallOutcome, CommandDispatcher, DispatchStatus, MethodTable};
pub use display::{DisplayRecord, Grouping, ViewerState};
pub use errors::FlowError;
pub use executor::{DisplayExecutor, DisplaySubmitter};
pub use frame::{FrameInfo, FrameParser, ObsFrameParser};
pub use identity::OperatorId;
pub use ingest::IngestionWorker;
pub use promise::Deferred;
pub use publish::{MemoryHub, PublishedRecord, ResultFields, ResultHub, ResultPublisher};
pub use source::{ChangeSource, DirectoryWatcher, RecordStream};
pub use types::{CallTag, ChannelName, FrameId, GroupingKey, MethodName};
