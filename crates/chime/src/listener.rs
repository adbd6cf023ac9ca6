use crate::error::{BoxError, ListenerResult};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type ListenerFn<A> = dyn Fn(&A) -> ListenerResult + Send + Sync;

/// A callback registered against an event name.
///
/// `Listener` is a cheap, cloneable handle. Identity is the shared allocation:
/// clones of one handle compare equal, two handles built from identical
/// closures do not. Keep a clone around to remove the listener later with
/// [`EventRegistry::off`](crate::EventRegistry::off).
pub struct Listener<A> {
    callback: Arc<ListenerFn<A>>,
}

impl<A: 'static> Listener<A> {
    /// Wrap an infallible callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(move |args: &A| {
                callback(args);
                Ok(())
            }),
        }
    }

    /// Wrap a callback whose failure is reported back to the `trigger` caller.
    pub fn fallible<F, E>(callback: F) -> Self
    where
        F: Fn(&A) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self {
            callback: Arc::new(move |args: &A| callback(args).map_err(Into::into)),
        }
    }
}

impl<A> Listener<A> {
    pub fn call(&self, args: &A) -> ListenerResult {
        (self.callback)(args)
    }

    pub fn same_as(&self, other: &Listener<A>) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl<A> Clone for Listener<A> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<A> PartialEq for Listener<A> {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl<A> Eq for Listener<A> {}

impl<A> fmt::Debug for Listener<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("ptr", &Arc::as_ptr(&self.callback).cast::<()>())
            .finish()
    }
}

impl<A: 'static, F> From<F> for Listener<A>
where
    F: Fn(&A) + Send + Sync + 'static,
{
    fn from(callback: F) -> Self {
        Self::new(callback)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    Plain,
    /// Removes its listener, and itself, when reached during dispatch.
    OnceGuard,
}

/// One registration in an event's listener list.
///
/// The `active` flag is the tombstone: in-flight dispatch passes hold the
/// entry through an `Arc` and check the flag right before invoking it.
#[derive(Debug)]
pub(crate) struct ListenerEntry<A> {
    pub(crate) listener: Listener<A>,
    pub(crate) kind: EntryKind,
    active: AtomicBool,
}

impl<A> ListenerEntry<A> {
    pub(crate) fn plain(listener: Listener<A>) -> Self {
        Self {
            listener,
            kind: EntryKind::Plain,
            active: AtomicBool::new(true),
        }
    }

    pub(crate) fn once_guard(target: Listener<A>) -> Self {
        Self {
            listener: target,
            kind: EntryKind::OnceGuard,
            active: AtomicBool::new(true),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub(crate) fn is_guard(&self) -> bool {
        self.kind == EntryKind::OnceGuard
    }

    /// Whether removing `listener` by identity should take this entry with it.
    /// Guards match the callback they expire.
    pub(crate) fn matches(&self, listener: &Listener<A>) -> bool {
        self.listener.same_as(listener)
    }
}
