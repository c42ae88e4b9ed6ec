//! # Event Bus
//!
//! Synchronous, multi-listener publish/subscribe for lifecycle notifications.
//! Events are independent of method dispatch and are never collision-checked.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Reserved event carrying listener failures.
pub const ERROR_EVENT: &str = "error";

/// An event listener.
pub type Listener = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

/// A named notification and its payload.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Event {
    /// Event name.
    pub name: String,

    /// Event data.
    pub payload: Value,
}

/// Listener registry and dispatcher.
///
/// Listeners are invoked in registration order. A listener that returns an
/// error or panics does not stop the remaining listeners: its failure is
/// reported through the [`ERROR_EVENT`] instead.
#[derive(Default)]
pub struct EventBus {
    listeners: DashMap<String, Vec<Listener>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `event`.
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(event, Arc::new(listener));
    }

    /// Register an already shared listener for `event`.
    pub fn subscribe(&self, event: impl Into<String>, listener: Listener) {
        let event = event.into();
        tracing::debug!(event = %event, "subscribing listener");
        self.listeners.entry(event).or_default().push(listener);
    }

    /// Invoke every listener registered for `event`, in registration order.
    ///
    /// Listeners are not awaited: a listener with asynchronous work must hand
    /// it off to its own executor.
    pub fn emit(&self, event: impl Into<String>, payload: Value) {
        let event = Event {
            name: event.into(),
            payload,
        };

        for listener in self.snapshot(&event.name) {
            if let Err(e) = invoke(&listener, &event) {
                self.report(&event, &e);
            }
        }
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, |l| l.len())
    }

    // Copy out the current listeners so none are invoked while the map is
    // locked (listeners may subscribe further listeners).
    fn snapshot(&self, event: &str) -> Vec<Listener> {
        self.listeners.get(event).map(|l| l.value().clone()).unwrap_or_default()
    }

    fn report(&self, event: &Event, err: &anyhow::Error) {
        if event.name == ERROR_EVENT {
            tracing::error!("error listener failed: {err}");
            return;
        }
        tracing::error!(event = %event.name, "listener failed: {err}");

        let failure = Event {
            name: ERROR_EVENT.to_string(),
            payload: json!({
                "event": event.name,
                "error": err.to_string(),
            }),
        };
        for listener in self.snapshot(ERROR_EVENT) {
            if let Err(e) = invoke(&listener, &failure) {
                tracing::error!("error listener failed: {e}");
            }
        }
    }
}

fn invoke(listener: &Listener, event: &Event) -> Result<()> {
    panic::catch_unwind(AssertUnwindSafe(|| listener(event))).unwrap_or_else(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(anyhow!("listener panicked: {msg}"))
    })
}
