use std::io;

use thiserror::Error;

use crate::types::MethodName;

/// Error type for configuration, ingestion, dispatch, and publication failures.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Identity or setup problem that prevents the core from starting.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// I/O failure from a change source or other transport.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// An arrival path or stream record that could not be understood.
    #[error("could not parse arrival '{item}': {reason}")]
    Parse {
        /// The offending path or record text.
        item: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A dispatch call named a target this core does not serve.
    #[error("unknown dispatch target '{0}'")]
    UnknownTarget(String),
    /// A dispatch call named a method outside the allow-list.
    #[error("no such method '{method}' on target '{target}'")]
    UnknownMethod {
        /// The target the caller addressed.
        target: String,
        /// The method that is not in the allow-list.
        method: MethodName,
    },
    /// The method body raised before handing off its completion handle.
    #[error("method invocation failed: {0}")]
    Invocation(String),
    /// The method accepted the call but its logic failed later.
    #[error("command execution failed: {0}")]
    Execution(String),
    /// The result hub rejected or could not deliver a publication.
    #[error("result publication failed: {0}")]
    Publication(String),
}
