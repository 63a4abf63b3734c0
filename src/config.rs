use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Controls identity resolution, data locations, loop timing, and dispatch
/// naming for one analysis console.
///
/// Constructed once at startup and passed by reference to constructors; there
/// is no ambient global state. Environment variables are consulted only when
/// building the [`Default`] value, so tests can override every field.
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    /// Explicit operator identity, tried before any other resolution step.
    pub operator_override: Option<String>,
    /// Login-style token (`uNNNNN`/`oNNNNN`) tried second; normally the
    /// current username.
    pub user_token: Option<String>,
    /// Single-line identity file tried last.
    pub identity_file: PathBuf,
    /// Directory observed for newly arrived data files.
    pub data_dir: PathBuf,
    /// Dispatch target name this console answers to.
    pub target: String,
    /// Pub/sub channel group under which dispatch results are published.
    pub channel_group: String,
    /// Timeout for one blocking `get` on the arrival queue; bounds shutdown
    /// latency for the ingestion worker and the executor.
    pub queue_timeout: Duration,
    /// Poll interval for change sources (stream reads, watcher ticks).
    pub poll_interval: Duration,
    /// Instrument codes whose groupings are split per detector.
    pub multi_detector: Vec<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        let home = env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            operator_override: None,
            user_token: env::var("USER").ok(),
            identity_file: home.join(".operator_id"),
            data_dir: PathBuf::from("/data"),
            target: "ANALYSIS".to_string(),
            channel_group: "tasks".to_string(),
            queue_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_secs(1),
            multi_detector: vec!["MCS".to_string(), "FCS".to_string()],
        }
    }
}
