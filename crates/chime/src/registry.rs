//! The named-event registry and its dispatch loop.
//!
//! Each event name maps to an ordered list of [`ListenerEntry`] values held
//! through `Arc`. `trigger` snapshots the list under the lock, releases it,
//! then walks the snapshot. Listeners may therefore call back into the
//! registry (`on`, `off`, `once`, `clear`, even a nested `trigger`) while a
//! pass is running.
//!
//! Removal tombstones entries and compacts the live list right away. A pass
//! only ever walks its own snapshot, so compaction never shifts it:
//!   - A listener removed by an earlier listener in the same pass is skipped.
//!   - A listener added during a pass first runs on the next pass.

use crate::config::{FailurePolicy, RegistryConfig};
use crate::error::{panic_message, BoxError, ListenerFailure, RegistryError, Result};
use crate::listener::{Listener, ListenerEntry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, trace, warn};

type Entries<A> = Vec<Arc<ListenerEntry<A>>>;

struct Inner<A> {
    events: HashMap<String, Entries<A>>,
}

fn visible<A>(list: &Entries<A>) -> Vec<Listener<A>> {
    list.iter()
        .filter(|entry| entry.is_active() && !entry.is_guard())
        .map(|entry| entry.listener.clone())
        .collect()
}

/// Summary of a completed dispatch pass.
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Listeners invoked during the pass, failed ones included.
    pub invoked: usize,
    /// Failures recorded under [`FailurePolicy::Isolate`]. Always empty under
    /// [`FailurePolicy::Abort`].
    pub failures: Vec<ListenerFailure>,
}

impl Dispatch {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// In-process publish/subscribe registry keyed by event name.
///
/// `A` is the argument pack handed to every listener, usually a tuple. Use
/// [`JsonRegistry`](crate::JsonRegistry) for untyped, variable-arity
/// arguments.
pub struct EventRegistry<A> {
    inner: Mutex<Inner<A>>,
    config: RegistryConfig,
}

impl<A: 'static> EventRegistry<A> {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: HashMap::new(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register `listener` for `event`, after any existing listeners.
    pub fn on(&self, event: impl Into<String>, listener: impl Into<Listener<A>>) -> &Self {
        let event = event.into();
        let entry = ListenerEntry::plain(listener.into());
        {
            let mut inner = self.inner.lock();
            self.list_mut(&mut inner, &event).push(Arc::new(entry));
        }
        debug!(event = %event, "registered listener");
        self
    }

    /// Register `listener` to run on the next `trigger` of `event` only.
    ///
    /// A guard entry is placed right after the listener. When dispatch
    /// reaches the guard, every registration of `listener` under `event` is
    /// removed along with the guard.
    pub fn once(&self, event: impl Into<String>, listener: impl Into<Listener<A>>) -> &Self {
        let event = event.into();
        let listener = listener.into();
        {
            let mut inner = self.inner.lock();
            let list = self.list_mut(&mut inner, &event);
            list.push(Arc::new(ListenerEntry::plain(listener.clone())));
            list.push(Arc::new(ListenerEntry::once_guard(listener)));
        }
        debug!(event = %event, "registered one-shot listener");
        self
    }

    /// Remove listeners from `event`.
    ///
    /// With `Some(listener)`, every registration identical to `listener` is
    /// removed, whether it came from `on` or `once`. With `None`, the whole
    /// list goes. Unknown events and listeners are ignored.
    pub fn off(&self, event: &str, listener: Option<&Listener<A>>) -> &Self {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let Some(list) = inner.events.get_mut(event) else {
            return self;
        };

        match listener {
            Some(listener) => {
                let mut removed = 0;
                for entry in list.iter().filter(|e| e.is_active() && e.matches(listener)) {
                    entry.deactivate();
                    removed += 1;
                }
                list.retain(|entry| entry.is_active());
                if list.is_empty() {
                    inner.events.remove(event);
                }
                if removed > 0 {
                    debug!(event, removed, "removed listener");
                }
            }
            None => {
                for entry in list.iter() {
                    entry.deactivate();
                }
                inner.events.remove(event);
                debug!(event, "removed all listeners");
            }
        }
        self
    }

    /// Remove every event and listener.
    pub fn clear(&self) -> &Self {
        let mut inner = self.inner.lock();
        let events = inner.events.len();
        for (_, list) in inner.events.drain() {
            for entry in &list {
                entry.deactivate();
            }
        }
        debug!(events, "cleared registry");
        self
    }

    /// Invoke every listener registered for `event`, in registration order.
    ///
    /// Unknown events are a no-op. How listener failures are handled depends
    /// on [`RegistryConfig::failure_policy`].
    pub fn trigger(&self, event: &str, args: A) -> Result<Dispatch> {
        let snapshot: Entries<A> = {
            let inner = self.inner.lock();
            let Some(list) = inner.events.get(event) else {
                return Ok(Dispatch::default());
            };
            list.iter().filter(|e| e.is_active()).cloned().collect()
        };

        if self.config.trace_dispatch {
            trace!(event, entries = snapshot.len(), "dispatching");
        }

        let mut dispatch = Dispatch::default();
        for entry in snapshot {
            if !entry.is_active() {
                continue;
            }
            if entry.is_guard() {
                entry.deactivate();
                self.off(event, Some(&entry.listener));
                debug!(event, "one-shot listener expired");
                continue;
            }

            let position = dispatch.invoked;
            dispatch.invoked += 1;

            match self.config.failure_policy {
                FailurePolicy::Abort => {
                    if let Err(source) = entry.listener.call(&args) {
                        debug!(event, position, "listener failed, aborting dispatch");
                        return Err(RegistryError::Listener {
                            event: event.to_string(),
                            position,
                            source,
                        });
                    }
                }
                FailurePolicy::Isolate => {
                    let outcome =
                        panic::catch_unwind(AssertUnwindSafe(|| entry.listener.call(&args)));
                    let error: BoxError = match outcome {
                        Ok(Ok(())) => continue,
                        Ok(Err(error)) => error,
                        Err(payload) => Box::new(RegistryError::ListenerPanicked {
                            message: panic_message(payload),
                        }),
                    };
                    warn!(event, position, error = %error, "listener failed");
                    dispatch.failures.push(ListenerFailure::new(position, error));
                }
            }
        }

        Ok(dispatch)
    }

    /// Copy of the active listeners for `event`, or `None` if it has none.
    pub fn listeners(&self, event: &str) -> Option<Vec<Listener<A>>> {
        let inner = self.inner.lock();
        let listeners = visible(inner.events.get(event)?);
        (!listeners.is_empty()).then_some(listeners)
    }

    /// Copy of the whole registry.
    pub fn all_listeners(&self) -> HashMap<String, Vec<Listener<A>>> {
        let inner = self.inner.lock();
        inner
            .events
            .iter()
            .map(|(event, list)| (event.clone(), visible(list)))
            .filter(|(_, listeners)| !listeners.is_empty())
            .collect()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners(event).map_or(0, |listeners| listeners.len())
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    /// Names with at least one active listener, sorted.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.all_listeners().into_keys().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.all_listeners().is_empty()
    }

    fn list_mut<'a>(&self, inner: &'a mut Inner<A>, event: &str) -> &'a mut Entries<A> {
        let capacity = self.config.capacity_hint;
        inner
            .events
            .entry(event.to_string())
            .or_insert_with(|| Vec::with_capacity(capacity))
    }
}

impl<A: 'static> Default for EventRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for EventRegistry<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        let mut counts: Vec<(&String, usize)> = inner
            .events
            .iter()
            .map(|(event, list)| (event, list.len()))
            .collect();
        counts.sort();
        f.debug_struct("EventRegistry")
            .field("events", &counts)
            .field("config", &self.config)
            .finish()
    }
}
