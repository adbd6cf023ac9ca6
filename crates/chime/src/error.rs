//! Registry error types

use thiserror::Error;

/// Error type returned by fallible listeners.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of a single listener invocation.
pub type ListenerResult = std::result::Result<(), BoxError>;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("listener #{position} for event '{event}' failed: {source}")]
    Listener {
        event: String,
        position: usize,
        #[source]
        source: BoxError,
    },

    #[error("listener panicked: {message}")]
    ListenerPanicked { message: String },
}

/// A listener failure recorded while dispatching under
/// [`FailurePolicy::Isolate`](crate::FailurePolicy::Isolate).
#[derive(Debug)]
pub struct ListenerFailure {
    /// Zero-based position of the listener within the dispatch pass.
    pub position: usize,
    pub error: BoxError,
}

impl ListenerFailure {
    pub fn new(position: usize, error: BoxError) -> Self {
        Self { position, error }
    }

    pub fn is_panic(&self) -> bool {
        matches!(
            self.error.downcast_ref::<RegistryError>(),
            Some(RegistryError::ListenerPanicked { .. })
        )
    }
}

pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "(non-string panic payload)".to_string()
    }
}
