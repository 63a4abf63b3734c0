//! Single-resolution deferred values with attached listeners.
//!
//! The dispatch path needs two completion signals per call (one when the
//! invocation returns on the executor, one when the method declares true
//! business completion), each observed by callbacks rather than by blocking.
//! `Deferred` is that primitive: resolve-once, listen-many.

use std::sync::{Arc, Mutex};

type Listener<T> = Box<dyn FnOnce(T) + Send + 'static>;

struct Inner<T> {
    value: Option<T>,
    listeners: Vec<Listener<T>>,
}

/// A value that is resolved at most once and delivered to every attached
/// listener.
///
/// Listeners attached before resolution run on the resolving thread, in
/// attachment order; listeners attached after resolution run immediately on
/// the attaching thread. A second `resolve` is ignored. There is no blocking
/// wait: a deferred that awaits external interaction consumes no thread.
pub struct Deferred<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    /// Create an unresolved deferred.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value: None,
                listeners: Vec::new(),
            })),
        }
    }

    /// Resolve with `value`, running all pending listeners.
    ///
    /// Returns `false` (and does nothing) if already resolved.
    pub fn resolve(&self, value: T) -> bool {
        let listeners = {
            let mut inner = self.inner.lock().expect("deferred poisoned");
            if inner.value.is_some() {
                return false;
            }
            inner.value = Some(value.clone());
            std::mem::take(&mut inner.listeners)
        };
        // Listeners run outside the lock so they may inspect or clone the
        // deferred without deadlocking.
        for listener in listeners {
            listener(value.clone());
        }
        true
    }

    /// Attach `listener`, firing it immediately if already resolved.
    pub fn on_resolved(&self, listener: impl FnOnce(T) + Send + 'static) {
        let mut inner = self.inner.lock().expect("deferred poisoned");
        if let Some(value) = inner.value.clone() {
            drop(inner);
            listener(value);
        } else {
            inner.listeners.push(Box::new(listener));
        }
    }

    /// Whether a value has been delivered.
    pub fn is_resolved(&self) -> bool {
        self.inner.lock().expect("deferred poisoned").value.is_some()
    }

    /// Snapshot of the resolved value, if any.
    pub fn value(&self) -> Option<T> {
        self.inner.lock().expect("deferred poisoned").value.clone()
    }
}

impl<T: Clone + Send + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}
