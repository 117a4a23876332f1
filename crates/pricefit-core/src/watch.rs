use serde::{Deserialize, Serialize};

/// Watch event type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
}

/// One notification from a control-plane watch stream
///
/// The object is kept undecoded: `ERROR` notifications carry a `Status`
/// rather than the watched kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    pub object: serde_json::Value,
}

impl WatchEvent {
    /// Create an ADDED event
    pub fn added(object: serde_json::Value) -> Self {
        Self {
            event_type: WatchEventType::Added,
            object,
        }
    }

    /// Create an ERROR event
    pub fn error(object: serde_json::Value) -> Self {
        Self {
            event_type: WatchEventType::Error,
            object,
        }
    }

    /// Message of an `ERROR` notification's status object
    pub fn status_message(&self) -> Option<&str> {
        self.object.get("message").and_then(|m| m.as_str())
    }
}
