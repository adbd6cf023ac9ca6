mod config;
mod error;
mod listener;
mod registry;

pub use config::{
    load_config_from_file, parse_config_content, ConfigFormat, FailurePolicy, RegistryConfig,
};
pub use error::{BoxError, ListenerFailure, ListenerResult, RegistryError, Result};
pub use listener::Listener;
pub use registry::{Dispatch, EventRegistry};

/// Untyped, variable-arity argument pack.
pub type Args = Vec<serde_json::Value>;

/// Registry whose listeners take [`Args`].
pub type JsonRegistry = EventRegistry<Args>;

#[doc(hidden)]
pub use serde_json as __serde_json;

/// Build an [`Args`] pack from any serializable values.
///
/// ```
/// let args = chime::args![1, "two", [3, 4]];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::__serde_json::json!($value)),*]
    };
}
