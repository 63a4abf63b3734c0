//! Remote-command dispatch into the display executor.
//!
//! Incoming calls arrive on whatever thread the transport uses. `dispatch`
//! does no blocking work: it validates the target, resolves the method
//! against an explicit allow-list, wires up the two deferred handles, hands
//! a closure to the executor, and returns. Result phases are published
//! through the [`ResultPublisher`] as the handles resolve.
//!
//! Per-call flow: the *invocation handle* resolves when the method's call
//! frame returns (or fails) on the display thread; the *completion handle*
//! is owned by the method body and resolved whenever the call is truly done,
//! possibly much later. The early phase is published only when the
//! invocation itself fails; the final phase is published exactly once per
//! accepted call.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error};

use crate::display::ViewerState;
use crate::errors::FlowError;
use crate::executor::DisplaySubmitter;
use crate::promise::Deferred;
use crate::publish::{ResultFields, ResultPublisher};
use crate::types::CallTag;

/// Keyword arguments of one dispatch call.
pub type Kwargs = serde_json::Map<String, Value>;

/// Immediate acknowledgement returned by [`CommandDispatcher::dispatch`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchStatus {
    /// The call was accepted for asynchronous execution.
    Ok,
    /// The call was rejected synchronously.
    Error,
}

impl DispatchStatus {
    /// Whether the call was accepted.
    pub fn is_ok(self) -> bool {
        matches!(self, DispatchStatus::Ok)
    }
}

/// Business outcome a method reports through its completion handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call completed successfully.
    Ok,
    /// The call failed; the message becomes the published `errmsg`.
    Error(String),
}

/// Per-call context handed to the invoked method.
///
/// Carries the call tag, a shared result-field accumulator, and the
/// completion handle. The method body owns the completion handle and must
/// eventually resolve it through [`CallContext::complete_ok`] or
/// [`CallContext::complete_err`] — synchronously or after arbitrary later
/// interaction. An unresolved handle leaves the call pending forever; this
/// is intentional for interactive methods, but a method that simply forgets
/// to complete leaks its call.
#[derive(Clone)]
pub struct CallContext {
    tag: CallTag,
    fields: Arc<Mutex<ResultFields>>,
    completion: Deferred<CallOutcome>,
}

impl CallContext {
    fn new(tag: impl Into<CallTag>) -> Self {
        Self {
            tag: tag.into(),
            fields: Arc::new(Mutex::new(ResultFields::new())),
            completion: Deferred::new(),
        }
    }

    /// The caller-supplied tag for this call.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Store a field to be merged into the final publication.
    pub fn set_field(&self, key: &str, value: Value) {
        self.fields
            .lock()
            .expect("call fields poisoned")
            .insert(key.to_string(), value);
    }

    /// Resolve the completion handle successfully.
    ///
    /// Returns `false` if the call was already completed.
    pub fn complete_ok(&self) -> bool {
        self.completion.resolve(CallOutcome::Ok)
    }

    /// Resolve the completion handle with a failure.
    pub fn complete_err(&self, errmsg: impl Into<String>) -> bool {
        self.completion.resolve(CallOutcome::Error(errmsg.into()))
    }

    /// The completion handle itself, for methods that stash it for later.
    pub fn completion(&self) -> Deferred<CallOutcome> {
        self.completion.clone()
    }

    fn snapshot_fields(&self) -> ResultFields {
        self.fields.lock().expect("call fields poisoned").clone()
    }
}

/// Signature of an invocable method.
///
/// Runs on the display thread with exclusive access to [`ViewerState`]. The
/// returned `Result` is the *invocation* outcome only; business completion
/// goes through the [`CallContext`].
pub type MethodFn =
    dyn Fn(&mut ViewerState, &CallContext, &[Value], &Kwargs) -> Result<(), FlowError>
        + Send
        + Sync;

/// Explicit allow-list of invocable methods, built at startup.
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: indexmap::IndexMap<String, Arc<MethodFn>>,
}

impl MethodTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `method` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: &str, method: F)
    where
        F: Fn(&mut ViewerState, &CallContext, &[Value], &Kwargs) -> Result<(), FlowError>
            + Send
            + Sync
            + 'static,
    {
        self.methods.insert(name.to_string(), Arc::new(method));
    }

    /// Look up a method by name.
    pub fn get(&self, name: &str) -> Option<Arc<MethodFn>> {
        self.methods.get(name).cloned()
    }

    /// Registered method names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

/// Entry point for externally-initiated remote calls.
pub struct CommandDispatcher {
    target: String,
    methods: MethodTable,
    submitter: DisplaySubmitter,
    publisher: ResultPublisher,
}

impl CommandDispatcher {
    /// Create a dispatcher serving `target` with the given allow-list.
    pub fn new(
        target: impl Into<String>,
        methods: MethodTable,
        submitter: DisplaySubmitter,
        publisher: ResultPublisher,
    ) -> Self {
        Self {
            target: target.into(),
            methods,
            submitter,
            publisher,
        }
    }

    /// The single target name this dispatcher answers to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Accept a remote call for asynchronous execution.
    ///
    /// Returns as soon as the call is scheduled, never when it completes.
    /// An unmatched `target` is rejected with no handles created and
    /// nothing published; an unknown `method` publishes a single
    /// early-error record under `tag` and is likewise rejected.
    pub fn dispatch(
        &self,
        tag: &str,
        target: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> DispatchStatus {
        debug!(tag, target, method, "command received");

        if target != self.target {
            let err = FlowError::UnknownTarget(target.to_string());
            error!(tag, expected = %self.target, %err, "rejecting call");
            return DispatchStatus::Error;
        }
        let Some(handler) = self.methods.get(method) else {
            let err = FlowError::UnknownMethod {
                target: target.to_string(),
                method: method.to_string(),
            };
            error!(tag, %err, "rejecting call for unknown method");
            self.publish_error(tag, &err.to_string());
            return DispatchStatus::Error;
        };

        let call = CallContext::new(tag);

        // Final phase: always published, exactly once, when the method
        // resolves its completion handle.
        {
            let completion = call.completion();
            let publisher = self.publisher.clone();
            let call = call.clone();
            let tag = tag.to_string();
            completion.on_resolved(move |outcome| {
                let mut fields = call.snapshot_fields();
                match outcome {
                    CallOutcome::Ok => {
                        fields
                            .entry("result".to_string())
                            .or_insert_with(|| Value::from("ok"));
                    }
                    CallOutcome::Error(errmsg) => {
                        error!(tag = %tag, errmsg = %errmsg, "command terminated by error");
                        fields.insert("result".to_string(), Value::from("error"));
                        fields.insert("errmsg".to_string(), Value::from(errmsg));
                    }
                }
                fields.insert("completed_at".to_string(), Value::from(now_secs()));
                publisher.publish(&tag, fields);
            });
        }

        // Early phase: published only if the invocation itself fails on the
        // executor. A failed invocation also resolves the completion handle
        // (a no-op if the method already did), so every accepted call still
        // publishes its final phase.
        let invocation: Deferred<Result<(), String>> = Deferred::new();
        {
            let publisher = self.publisher.clone();
            let call = call.clone();
            let tag = tag.to_string();
            invocation.on_resolved(move |outcome| match outcome {
                Ok(()) => debug!(tag = %tag, "command reached its interactive stage"),
                Err(reason) => {
                    let err = FlowError::Invocation(reason);
                    error!(tag = %tag, %err, "command invocation failed");
                    let errmsg = err.to_string();
                    let mut fields = ResultFields::new();
                    fields.insert("completed_at".to_string(), Value::from(now_secs()));
                    fields.insert("result".to_string(), Value::from("error"));
                    fields.insert("errmsg".to_string(), Value::from(errmsg.clone()));
                    publisher.publish(&tag, fields);
                    call.complete_err(errmsg);
                }
            });
        }

        let call_for_method = call.clone();
        self.submitter.call_with_handle(invocation, move |state| {
            handler(state, &call_for_method, &args, &kwargs)
        });
        DispatchStatus::Ok
    }

    fn publish_error(&self, tag: &str, errmsg: &str) {
        let mut fields = ResultFields::new();
        fields.insert("completed_at".to_string(), Value::from(now_secs()));
        fields.insert("result".to_string(), Value::from("error"));
        fields.insert("errmsg".to_string(), Value::from(errmsg));
        self.publisher.publish(tag, fields);
    }
}

fn now_secs() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6
}
