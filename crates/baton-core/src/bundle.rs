//! Opaque key/value payloads
//!
//! Node arguments, saved view state and handler state all travel as a
//! [`Bundle`]: a JSON object map. The engine never interprets their contents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Generic key/value payload
pub type Bundle = Map<String, Value>;

/// Build a bundle from `(key, value)` pairs
pub fn bundle<I, K, V>(pairs: I) -> Bundle
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A request to the host to launch something outside the navigation tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Intent {
    /// What the host should do (e.g. "open_url", "pick_file")
    pub action: String,

    /// Action-specific payload
    #[serde(default)]
    pub extras: Bundle,
}

impl Intent {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            extras: Bundle::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }
}
