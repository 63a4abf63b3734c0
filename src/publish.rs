//! Result publication to the external pub/sub hub.
//!
//! The hub itself is a collaborator behind the [`ResultHub`] trait; this
//! module owns what crosses the boundary: field maps are cleansed to plain
//! integer/float numbers first, and a hub failure is logged, never raised
//! back into the call that produced the result.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use serde_json::{Number, Value};
use tracing::{debug, warn};

use crate::errors::FlowError;
use crate::types::{CallTag, ChannelName};

/// Field map published for one result phase.
pub type ResultFields = serde_json::Map<String, Value>;

/// External pub/sub hub interface, keyed by channel group and call tag.
pub trait ResultHub: Send + Sync {
    /// Deliver `fields` under `channel` with `tag` as the routing key.
    fn setvals(&self, channel: &str, tag: &str, fields: &ResultFields) -> Result<(), FlowError>;
}

/// Publishes dispatch outcomes to a hub under one channel group.
#[derive(Clone)]
pub struct ResultPublisher {
    hub: Arc<dyn ResultHub>,
    channel: ChannelName,
}

impl ResultPublisher {
    /// Create a publisher for `channel` on `hub`.
    pub fn new(hub: Arc<dyn ResultHub>, channel: impl Into<ChannelName>) -> Self {
        Self {
            hub,
            channel: channel.into(),
        }
    }

    /// Cleanse `fields` and forward them under `tag`.
    ///
    /// Hub unavailability is logged only; publication failure does not
    /// retro-actively fail the call that produced the result.
    pub fn publish(&self, tag: &str, mut fields: ResultFields) {
        cleanse_fields(&mut fields);
        debug!(tag, channel = %self.channel, "publishing result");
        if let Err(error) = self.hub.setvals(&self.channel, tag, &fields) {
            warn!(tag, %error, "result publication failed");
        }
    }
}

/// Normalize every numeric value to a portable integer or float.
///
/// Published maps must not leak library-specific numeric representations:
/// integers that fit `i64` become plain integers, everything else numeric
/// becomes a plain float. Arrays and nested objects are cleansed recursively.
pub fn cleanse_fields(fields: &mut ResultFields) {
    for value in fields.values_mut() {
        cleanse_value(value);
    }
}

fn cleanse_value(value: &mut Value) {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                *n = Number::from(i);
            } else if let Some(f) = n.as_f64() {
                if let Some(plain) = Number::from_f64(f) {
                    *n = plain;
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                cleanse_value(item);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                cleanse_value(item);
            }
        }
        _ => {}
    }
}

/// One record captured by [`MemoryHub`].
#[derive(Clone, Debug)]
pub struct PublishedRecord {
    /// Channel group the record was published under.
    pub channel: ChannelName,
    /// Routing key (the call tag).
    pub tag: CallTag,
    /// Cleansed field map.
    pub fields: ResultFields,
}

/// In-process hub that records publications, for tests and demos.
#[derive(Default)]
pub struct MemoryHub {
    records: Mutex<Vec<PublishedRecord>>,
    arrived: Condvar,
}

impl MemoryHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn records(&self) -> Vec<PublishedRecord> {
        self.records.lock().expect("memory hub poisoned").clone()
    }

    /// Publications under `tag`, oldest first.
    pub fn records_for(&self, tag: &str) -> Vec<PublishedRecord> {
        self.records()
            .into_iter()
            .filter(|record| record.tag == tag)
            .collect()
    }

    /// Wait until at least `count` records exist under `tag`, or until
    /// `timeout` elapses; returns the records seen either way.
    pub fn wait_for(&self, tag: &str, count: usize, timeout: Duration) -> Vec<PublishedRecord> {
        let deadline = Instant::now() + timeout;
        let mut records = self.records.lock().expect("memory hub poisoned");
        loop {
            let matching = records.iter().filter(|r| r.tag == tag).count();
            if matching >= count {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _result) = self
                .arrived
                .wait_timeout(records, deadline - now)
                .expect("memory hub poisoned");
            records = guard;
        }
        records
            .iter()
            .filter(|record| record.tag == tag)
            .cloned()
            .collect()
    }
}

impl ResultHub for MemoryHub {
    fn setvals(&self, channel: &str, tag: &str, fields: &ResultFields) -> Result<(), FlowError> {
        let mut records = self.records.lock().expect("memory hub poisoned");
        records.push(PublishedRecord {
            channel: channel.to_string(),
            tag: tag.to_string(),
            fields: fields.clone(),
        });
        self.arrived.notify_all();
        Ok(())
    }
}
